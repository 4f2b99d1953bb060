use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;
use crate::schedule::capacity::{BookableUnit, Occupancy};

use super::{Store, StoreError};

/// Owned copy of a bookable unit's rows.
#[derive(Debug, Clone)]
pub enum UnitRecord {
    Recurring { rule: RecurringRule, instance: Instance },
    Single(Session),
}

impl UnitRecord {
    pub fn as_unit(&self) -> BookableUnit<'_> {
        match self {
            UnitRecord::Recurring { rule, instance } => BookableUnit::Recurring { rule, instance },
            UnitRecord::Single(session) => BookableUnit::Single(session),
        }
    }
}

impl Store {
    pub(super) fn instance_by_key(&self, rule_id: Ulid, date: NaiveDate) -> Option<Instance> {
        let id = self.instance_keys.get(&(rule_id, date)).map(|e| *e.value())?;
        self.instances.get(&id).map(|e| e.value().clone())
    }

    pub fn unit_record(&self, target: RegistrationTarget) -> Result<UnitRecord, StoreError> {
        match target {
            RegistrationTarget::Instance(id) => {
                let instance = self
                    .instances
                    .get(&id)
                    .map(|e| e.value().clone())
                    .ok_or(StoreError::NotFound(id))?;
                let rule = self
                    .rules
                    .get(&instance.rule_id)
                    .map(|e| e.value().clone())
                    .ok_or(StoreError::NotFound(instance.rule_id))?;
                Ok(UnitRecord::Recurring { rule, instance })
            }
            RegistrationTarget::Session(id) | RegistrationTarget::Workshop(id) => {
                let kind = target
                    .kind()
                    .session_kind()
                    .ok_or(StoreError::Invalid("not a session target"))?;
                self.session_table(kind)
                    .get(&id)
                    .map(|e| UnitRecord::Single(e.value().clone()))
                    .ok_or(StoreError::NotFound(id))
            }
        }
    }

    /// Rules ordered by weekday, then start time.
    pub fn list_rules(&self) -> Vec<RecurringRule> {
        let mut rules: Vec<RecurringRule> = self.rules.iter().map(|e| e.value().clone()).collect();
        rules.sort_by(|a, b| {
            (a.day_of_week, a.time_start, a.id).cmp(&(b.day_of_week, b.time_start, b.id))
        });
        rules
    }

    pub fn rule(&self, id: Ulid) -> Option<RecurringRule> {
        self.rules.get(&id).map(|e| e.value().clone())
    }

    pub fn instance(&self, id: Ulid) -> Option<Instance> {
        self.instances.get(&id).map(|e| e.value().clone())
    }

    /// Persisted instances of a rule, by date.
    pub fn instances_of(&self, rule_id: Ulid) -> Vec<Instance> {
        let mut instances: Vec<Instance> = self
            .instances
            .iter()
            .filter(|e| e.value().rule_id == rule_id)
            .map(|e| e.value().clone())
            .collect();
        instances.sort_by_key(|i| i.date);
        instances
    }

    /// Sessions of one table ordered by date, then start time.
    pub fn list_sessions(&self, kind: SessionKind) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .session_table(kind)
            .iter()
            .map(|e| e.value().clone())
            .collect();
        sessions.sort_by(|a, b| (a.date, a.time_start, a.id).cmp(&(b.date, b.time_start, b.id)));
        sessions
    }

    pub fn session(&self, kind: SessionKind, id: Ulid) -> Option<Session> {
        self.session_table(kind).get(&id).map(|e| e.value().clone())
    }

    pub fn sessions_between(&self, kind: SessionKind, start: NaiveDate, end: NaiveDate) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .session_table(kind)
            .iter()
            .filter(|e| {
                let s = e.value();
                s.active && s.date >= start && s.date <= end
            })
            .map(|e| e.value().clone())
            .collect();
        sessions.sort_by(|a, b| (a.date, a.time_start, a.id).cmp(&(b.date, b.time_start, b.id)));
        sessions
    }

    /// Registrations of one unit in booking order.
    pub async fn registrations_for(
        &self,
        target: RegistrationTarget,
    ) -> Result<Vec<Registration>, StoreError> {
        let roster = self
            .roster(&target)
            .ok_or(StoreError::NotFound(target.unit_id()))?;
        let guard = roster.read().await;
        Ok(guard
            .registration_ids
            .iter()
            .filter_map(|id| self.registrations.get(id).map(|e| e.value().clone()))
            .collect())
    }

    pub fn registration(&self, id: Ulid) -> Option<Registration> {
        self.registrations.get(&id).map(|e| e.value().clone())
    }

    pub async fn registration_count(&self, target: RegistrationTarget) -> Result<u32, StoreError> {
        let roster = self
            .roster(&target)
            .ok_or(StoreError::NotFound(target.unit_id()))?;
        let guard = roster.read().await;
        Ok(guard.registration_ids.len() as u32)
    }

    pub async fn has_capacity(&self, target: RegistrationTarget) -> Result<bool, StoreError> {
        let roster = self
            .roster(&target)
            .ok_or(StoreError::NotFound(target.unit_id()))?;
        let guard = roster.read().await;
        if guard.closed {
            return Err(StoreError::NotFound(target.unit_id()));
        }
        let record = self.unit_record(target)?;
        let unit = record.as_unit();
        Ok(unit.is_bookable()
            && !Occupancy::of(&unit, guard.registration_ids.len() as u32).is_full())
    }

    /// Newest first.
    pub fn list_messages(&self) -> Vec<ContactMessage> {
        let mut messages: Vec<ContactMessage> =
            self.messages.iter().map(|e| e.value().clone()).collect();
        messages.sort_by(|a, b| b.received_at.cmp(&a.received_at).then(b.id.cmp(&a.id)));
        messages
    }
}
