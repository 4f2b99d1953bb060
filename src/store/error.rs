use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::RegistrationTarget;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(Ulid),
    #[error("already exists: {0}")]
    AlreadyExists(Ulid),
    /// Unique (rule, date) constraint on instances.
    #[error("instance of rule {rule_id} on {date} already exists")]
    DuplicateInstance { rule_id: Ulid, date: NaiveDate },
    #[error("{target} is full: all {capacity} spots taken")]
    CapacityExceeded {
        target: RegistrationTarget,
        capacity: u32,
    },
    #[error("{0} is cancelled or inactive")]
    Unavailable(RegistrationTarget),
    #[error("invalid: {0}")]
    Invalid(&'static str),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("WAL error: {0}")]
    WalError(String),
}
