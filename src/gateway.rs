//! The persistence surface the schedule core runs against.
//!
//! [`crate::store::Store`] is the production implementation. Every method is a
//! single round trip; the ones documented as atomic must stay atomic in any
//! other implementation.

use async_trait::async_trait;
use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;
use crate::store::StoreError;

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Rules with `active == true`.
    async fn active_rules(&self) -> Result<Vec<RecurringRule>, StoreError>;

    async fn get_rule(&self, id: Ulid) -> Result<Option<RecurringRule>, StoreError>;

    async fn get_instance(&self, id: Ulid) -> Result<Option<Instance>, StoreError>;

    async fn find_instance(
        &self,
        rule_id: Ulid,
        date: NaiveDate,
    ) -> Result<Option<Instance>, StoreError>;

    /// Atomic: concurrent callers for the same `(rule_id, date)` all get the same row.
    async fn get_or_create_instance(
        &self,
        rule_id: Ulid,
        date: NaiveDate,
    ) -> Result<Instance, StoreError>;

    /// Replace the override fields (cancelled, capacity override, note) of an instance.
    async fn update_instance(&self, instance: Instance) -> Result<Instance, StoreError>;

    async fn get_session(&self, kind: SessionKind, id: Ulid) -> Result<Option<Session>, StoreError>;

    /// Active sessions of one table dated within `[start, end]`.
    async fn active_sessions(
        &self,
        kind: SessionKind,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Session>, StoreError>;

    /// Online registrations only; reserved spots are not included.
    async fn count_registrations(&self, target: RegistrationTarget) -> Result<u32, StoreError>;

    /// True iff the unit is bookable and has a spot left, against live data.
    async fn check_capacity(&self, target: RegistrationTarget) -> Result<bool, StoreError>;

    /// Atomic check-then-insert. Fails with `CapacityExceeded` or `Unavailable`
    /// without writing anything.
    async fn insert_registration(
        &self,
        registration: Registration,
    ) -> Result<Registration, StoreError>;
}
