//! The write path: one registration against one unit.

use chrono::Utc;
use ulid::Ulid;

use crate::gateway::Gateway;
use crate::model::{Participant, Registration, RegistrationTarget};
use crate::validate;

use super::ScheduleError;

fn outcome(result: &Result<Registration, ScheduleError>) -> &'static str {
    match result {
        Ok(_) => "booked",
        Err(ScheduleError::CapacityExceeded { .. }) => "full",
        Err(ScheduleError::UnitUnavailable(_)) => "unavailable",
        Err(ScheduleError::Validation(_)) => "invalid",
        Err(ScheduleError::NotFound(_)) => "not_found",
        Err(ScheduleError::PersistenceUnreachable(_)) => "error",
    }
}

/// Book `participant` onto `target`.
///
/// Fields are checked before anything is sent. The capacity check and the
/// insert happen in one gateway call, so a full or cancelled unit is
/// rejected without writing. Resubmitting books a second seat.
pub async fn book<G: Gateway + ?Sized>(
    gateway: &G,
    target: RegistrationTarget,
    participant: Participant,
) -> Result<Registration, ScheduleError> {
    book_with_id(gateway, Ulid::new(), target, participant).await
}

/// [`book`] with a caller-chosen registration id.
pub async fn book_with_id<G: Gateway + ?Sized>(
    gateway: &G,
    id: Ulid,
    target: RegistrationTarget,
    participant: Participant,
) -> Result<Registration, ScheduleError> {
    let result = match validate::participant(participant) {
        Ok(participant) => {
            let registration = Registration {
                id,
                target,
                participant,
                created_at: Utc::now(),
            };
            gateway
                .insert_registration(registration)
                .await
                .map_err(ScheduleError::from)
        }
        Err(errors) => Err(errors.into()),
    };

    metrics::counter!(crate::observability::BOOKINGS_TOTAL, "outcome" => outcome(&result))
        .increment(1);
    match &result {
        Ok(registration) => {
            tracing::info!(registration = %registration.id, %target, "booked")
        }
        Err(ScheduleError::PersistenceUnreachable(e)) => {
            tracing::error!(%target, "booking failed: {e}")
        }
        Err(e) => tracing::debug!(%target, "booking rejected: {e}"),
    }
    result
}
