use async_trait::async_trait;
use chrono::NaiveDate;
use ulid::Ulid;

use crate::gateway::Gateway;
use crate::model::*;

use super::{Store, StoreError};

#[async_trait]
impl Gateway for Store {
    async fn active_rules(&self) -> Result<Vec<RecurringRule>, StoreError> {
        Ok(self.list_rules().into_iter().filter(|r| r.active).collect())
    }

    async fn get_rule(&self, id: Ulid) -> Result<Option<RecurringRule>, StoreError> {
        Ok(self.rule(id))
    }

    async fn get_instance(&self, id: Ulid) -> Result<Option<Instance>, StoreError> {
        Ok(self.instance(id))
    }

    async fn find_instance(
        &self,
        rule_id: Ulid,
        date: NaiveDate,
    ) -> Result<Option<Instance>, StoreError> {
        Ok(self.instance_by_key(rule_id, date))
    }

    async fn get_or_create_instance(
        &self,
        rule_id: Ulid,
        date: NaiveDate,
    ) -> Result<Instance, StoreError> {
        Store::get_or_create_instance(self, rule_id, date).await
    }

    async fn update_instance(&self, instance: Instance) -> Result<Instance, StoreError> {
        Store::update_instance(self, instance).await
    }

    async fn get_session(&self, kind: SessionKind, id: Ulid) -> Result<Option<Session>, StoreError> {
        Ok(self.session(kind, id))
    }

    async fn active_sessions(
        &self,
        kind: SessionKind,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Session>, StoreError> {
        Ok(self.sessions_between(kind, start, end))
    }

    async fn count_registrations(&self, target: RegistrationTarget) -> Result<u32, StoreError> {
        self.registration_count(target).await
    }

    async fn check_capacity(&self, target: RegistrationTarget) -> Result<bool, StoreError> {
        self.has_capacity(target).await
    }

    async fn insert_registration(
        &self,
        registration: Registration,
    ) -> Result<Registration, StoreError> {
        Store::insert_registration(self, registration).await
    }
}
