use ulid::Ulid;

use crate::model::RegistrationTarget;
use crate::store::StoreError;
use crate::validate::ValidationErrors;

/// What the schedule core reports to its callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// The store failed or refused in a way the caller can only retry.
    #[error("could not reach the studio database: {0}")]
    PersistenceUnreachable(#[source] StoreError),
    #[error("{target} is fully booked ({capacity} spots)")]
    CapacityExceeded {
        target: RegistrationTarget,
        capacity: u32,
    },
    #[error("{0} was cancelled or is no longer offered")]
    UnitUnavailable(RegistrationTarget),
    #[error("{0}")]
    Validation(ValidationErrors),
    #[error("not found: {0}")]
    NotFound(Ulid),
}

impl From<StoreError> for ScheduleError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::CapacityExceeded { target, capacity } => {
                ScheduleError::CapacityExceeded { target, capacity }
            }
            StoreError::Unavailable(target) => ScheduleError::UnitUnavailable(target),
            StoreError::NotFound(id) => ScheduleError::NotFound(id),
            StoreError::Invalid(msg) | StoreError::LimitExceeded(msg) => {
                ScheduleError::Validation(ValidationErrors::single("record", msg))
            }
            StoreError::AlreadyExists(_) => {
                ScheduleError::Validation(ValidationErrors::single("id", "already exists"))
            }
            other @ (StoreError::DuplicateInstance { .. } | StoreError::WalError(_)) => {
                ScheduleError::PersistenceUnreachable(other)
            }
        }
    }
}

impl From<ValidationErrors> for ScheduleError {
    fn from(e: ValidationErrors) -> Self {
        ScheduleError::Validation(e)
    }
}
