//! Pairs a rule occurrence with its persisted instance row.

use chrono::NaiveDate;
use ulid::Ulid;

use crate::gateway::Gateway;
use crate::limits::MAX_RECONCILE_RETRIES;
use crate::model::Instance;
use crate::store::StoreError;

use super::ScheduleError;

/// The instance of `rule_id` on `date`, created with default overrides if
/// it does not exist yet.
///
/// Creation goes through the gateway's atomic get-or-create. A unique
/// violation means another writer created the row first; the row is then
/// looked up again instead of failing.
pub async fn resolve<G: Gateway + ?Sized>(
    gateway: &G,
    rule_id: Ulid,
    date: NaiveDate,
) -> Result<Instance, ScheduleError> {
    if let Some(existing) = gateway.find_instance(rule_id, date).await? {
        return Ok(existing);
    }
    let mut races = 0;
    loop {
        match gateway.get_or_create_instance(rule_id, date).await {
            Ok(instance) => return Ok(instance),
            Err(StoreError::DuplicateInstance { .. }) if races < MAX_RECONCILE_RETRIES => {
                races += 1;
                metrics::counter!(crate::observability::RECONCILE_RACES_TOTAL).increment(1);
                tracing::debug!(rule = %rule_id, %date, attempt = races, "lost instance creation race");
                if let Some(existing) = gateway.find_instance(rule_id, date).await? {
                    return Ok(existing);
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}
