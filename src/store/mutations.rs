use chrono::NaiveDate;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::notify::Notification;
use crate::schedule::capacity::Occupancy;
use crate::schedule::dates::occurrences;

use super::checks::*;
use super::{Store, StoreError};

impl Store {
    // ── Recurring rules ──────────────────────────────────────

    pub async fn create_rule(&self, rule: RecurringRule) -> Result<RecurringRule, StoreError> {
        if self.rules.len() >= MAX_RULES {
            return Err(StoreError::LimitExceeded("too many recurring rules"));
        }
        if self.rules.contains_key(&rule.id) {
            return Err(StoreError::AlreadyExists(rule.id));
        }
        validate_rule(&rule)?;
        let event = Event::RuleCreated { rule: rule.clone() };
        self.persist_and_apply(&event, &mut []).await?;
        Ok(rule)
    }

    /// Existing instances must stay on dates the updated rule still produces.
    pub async fn update_rule(&self, rule: RecurringRule) -> Result<RecurringRule, StoreError> {
        validate_rule(&rule)?;
        let _gate = self.instance_gate.lock().await;
        let current_dow = self
            .rules
            .get(&rule.id)
            .map(|r| r.day_of_week)
            .ok_or(StoreError::NotFound(rule.id))?;
        let dates = self.instance_dates_of(rule.id);
        if !dates.is_empty() {
            if current_dow != rule.day_of_week {
                return Err(StoreError::Invalid("day_of_week is fixed once instances exist"));
            }
            let orphaned = dates
                .iter()
                .any(|d| occurrences(&rule, *d, *d).dates.is_empty());
            if orphaned {
                return Err(StoreError::Invalid(
                    "course change would drop dates that already have instances",
                ));
            }
        }
        let event = Event::RuleUpdated { rule: rule.clone() };
        self.persist_and_apply(&event, &mut []).await?;
        Ok(rule)
    }

    /// Deletes the rule with its instances and their registrations.
    pub async fn delete_rule(&self, id: Ulid) -> Result<(), StoreError> {
        let _gate = self.instance_gate.lock().await;
        if !self.rules.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        let mut guards = self.lock_rosters(self.instance_targets_of(id)).await;
        self.persist_and_apply(&Event::RuleDeleted { id }, &mut guards)
            .await
    }

    // ── Instances ────────────────────────────────────────────

    /// Double-checked under the instance gate: at most one row per (rule, date).
    pub async fn get_or_create_instance(
        &self,
        rule_id: Ulid,
        date: NaiveDate,
    ) -> Result<Instance, StoreError> {
        if let Some(existing) = self.instance_by_key(rule_id, date) {
            return Ok(existing);
        }
        let _gate = self.instance_gate.lock().await;
        if let Some(existing) = self.instance_by_key(rule_id, date) {
            return Ok(existing);
        }
        let instance = Instance::new(Ulid::new(), rule_id, date);
        self.create_instance_locked(&instance).await?;
        Ok(instance)
    }

    /// Plain insert honouring the unique (rule, date) constraint.
    pub async fn insert_instance(&self, instance: Instance) -> Result<Instance, StoreError> {
        let _gate = self.instance_gate.lock().await;
        if self
            .instance_keys
            .contains_key(&(instance.rule_id, instance.date))
        {
            return Err(StoreError::DuplicateInstance {
                rule_id: instance.rule_id,
                date: instance.date,
            });
        }
        if self.instances.contains_key(&instance.id) {
            return Err(StoreError::AlreadyExists(instance.id));
        }
        self.create_instance_locked(&instance).await?;
        Ok(instance)
    }

    /// Caller holds `instance_gate`.
    async fn create_instance_locked(&self, instance: &Instance) -> Result<(), StoreError> {
        let rule_dow = self
            .rules
            .get(&instance.rule_id)
            .map(|r| r.day_of_week)
            .ok_or(StoreError::NotFound(instance.rule_id))?;
        if day_of_week(instance.date) != rule_dow {
            return Err(StoreError::Invalid("date does not fall on the rule's weekday"));
        }
        validate_instance(instance)?;
        let event = Event::InstanceCreated {
            instance: instance.clone(),
        };
        self.persist_and_apply(&event, &mut []).await?;
        metrics::counter!(crate::observability::INSTANCES_CREATED_TOTAL).increment(1);
        tracing::debug!(rule = %instance.rule_id, date = %instance.date, "instance created");
        Ok(())
    }

    /// Replace override fields. Serialized with bookings on the same instance.
    pub async fn update_instance(&self, instance: Instance) -> Result<Instance, StoreError> {
        validate_instance(&instance)?;
        let target = RegistrationTarget::Instance(instance.id);
        let roster = self
            .roster(&target)
            .ok_or(StoreError::NotFound(instance.id))?;
        let mut guard = roster.write_owned().await;
        if guard.closed {
            return Err(StoreError::NotFound(instance.id));
        }
        let current = self
            .instances
            .get(&instance.id)
            .map(|e| e.value().clone())
            .ok_or(StoreError::NotFound(instance.id))?;
        if current.rule_id != instance.rule_id || current.date != instance.date {
            return Err(StoreError::Invalid("rule and date of an instance are immutable"));
        }
        let event = Event::InstanceUpdated {
            instance: instance.clone(),
        };
        self.persist_and_apply(&event, std::slice::from_mut(&mut guard))
            .await?;
        Ok(instance)
    }

    // ── One-time sessions & workshops ────────────────────────

    pub async fn create_session(&self, session: Session) -> Result<Session, StoreError> {
        let table = self.session_table(session.kind);
        if table.len() >= MAX_SESSIONS_PER_TABLE {
            return Err(StoreError::LimitExceeded("too many sessions"));
        }
        if table.contains_key(&session.id) {
            return Err(StoreError::AlreadyExists(session.id));
        }
        validate_session(&session)?;
        let event = Event::SessionCreated {
            session: session.clone(),
        };
        self.persist_and_apply(&event, &mut []).await?;
        Ok(session)
    }

    pub async fn update_session(&self, session: Session) -> Result<Session, StoreError> {
        validate_session(&session)?;
        let roster = self
            .roster(&session.target())
            .ok_or(StoreError::NotFound(session.id))?;
        let mut guard = roster.write_owned().await;
        if guard.closed || !self.session_table(session.kind).contains_key(&session.id) {
            return Err(StoreError::NotFound(session.id));
        }
        let event = Event::SessionUpdated {
            session: session.clone(),
        };
        self.persist_and_apply(&event, std::slice::from_mut(&mut guard))
            .await?;
        Ok(session)
    }

    /// Deletes the session and its registrations.
    pub async fn delete_session(&self, kind: SessionKind, id: Ulid) -> Result<(), StoreError> {
        let roster = self
            .roster(&kind.target(id))
            .ok_or(StoreError::NotFound(id))?;
        let mut guard = roster.write_owned().await;
        if guard.closed || !self.session_table(kind).contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        self.persist_and_apply(
            &Event::SessionDeleted { kind, id },
            std::slice::from_mut(&mut guard),
        )
        .await
    }

    // ── Registrations ────────────────────────────────────────

    /// The authoritative capacity gate: check and insert under the unit's roster lock.
    pub async fn insert_registration(
        &self,
        registration: Registration,
    ) -> Result<Registration, StoreError> {
        validate_participant(&registration.participant)?;
        // Held until the row is applied, so a concurrent insert with the same id fails here.
        let _claim = self.claim_registration_id(registration.id)?;
        let target = registration.target;
        let roster = self
            .roster(&target)
            .ok_or(StoreError::NotFound(target.unit_id()))?;
        let mut guard = roster.write_owned().await;
        if guard.closed {
            return Err(StoreError::NotFound(target.unit_id()));
        }

        let record = self.unit_record(target)?;
        let unit = record.as_unit();
        if !unit.is_bookable() {
            return Err(StoreError::Unavailable(target));
        }
        if guard.registration_ids.len() >= MAX_REGISTRATIONS_PER_UNIT {
            return Err(StoreError::LimitExceeded("too many registrations on unit"));
        }
        let occupancy = Occupancy::of(&unit, guard.registration_ids.len() as u32);
        if occupancy.is_full() {
            return Err(StoreError::CapacityExceeded {
                target,
                capacity: occupancy.capacity,
            });
        }
        let title = unit.title().to_string();
        let date = unit.date();

        let event = Event::RegistrationCreated {
            registration: registration.clone(),
        };
        self.persist_and_apply(&event, std::slice::from_mut(&mut guard))
            .await?;
        drop(guard);

        self.notify.send(Notification::RegistrationCreated {
            registration: registration.clone(),
            title,
            date,
        });
        Ok(registration)
    }

    fn claim_registration_id(&self, id: Ulid) -> Result<IdClaim<'_>, StoreError> {
        match self.pending_registration_ids.entry(id) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(id)),
            Entry::Vacant(slot) => {
                if self.registrations.contains_key(&id) {
                    return Err(StoreError::AlreadyExists(id));
                }
                slot.insert(());
                Ok(IdClaim {
                    pending: &self.pending_registration_ids,
                    id,
                })
            }
        }
    }

    pub async fn delete_registration(&self, id: Ulid) -> Result<RegistrationTarget, StoreError> {
        let target = self
            .registrations
            .get(&id)
            .map(|e| e.value().target)
            .ok_or(StoreError::NotFound(id))?;
        let roster = self.roster(&target).ok_or(StoreError::NotFound(id))?;
        let mut guard = roster.write_owned().await;
        if !guard.registration_ids.contains(&id) {
            return Err(StoreError::NotFound(id));
        }
        self.persist_and_apply(
            &Event::RegistrationDeleted { id, target },
            std::slice::from_mut(&mut guard),
        )
        .await?;
        drop(guard);
        self.notify
            .send(Notification::RegistrationDeleted { id, target });
        Ok(target)
    }

    // ── Contact messages ─────────────────────────────────────

    pub async fn submit_message(&self, message: ContactMessage) -> Result<ContactMessage, StoreError> {
        if self.messages.len() >= MAX_MESSAGES {
            return Err(StoreError::LimitExceeded("too many messages"));
        }
        if self.messages.contains_key(&message.id) {
            return Err(StoreError::AlreadyExists(message.id));
        }
        validate_message(&message)?;
        let event = Event::MessageReceived {
            message: message.clone(),
        };
        self.persist_and_apply(&event, &mut []).await?;
        self.notify.send(Notification::MessageReceived {
            message: message.clone(),
        });
        Ok(message)
    }

    pub async fn mark_message_read(&self, id: Ulid) -> Result<(), StoreError> {
        if !self.messages.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        self.persist_and_apply(&Event::MessageRead { id }, &mut [])
            .await
    }

    pub async fn delete_message(&self, id: Ulid) -> Result<(), StoreError> {
        if !self.messages.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        self.persist_and_apply(&Event::MessageDeleted { id }, &mut [])
            .await
    }
}

/// Releases a pending registration id on drop, committed or not.
struct IdClaim<'a> {
    pending: &'a DashMap<Ulid, ()>,
    id: Ulid,
}

impl Drop for IdClaim<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}
