//! Back-office overrides on single occurrences of a recurring class.

use chrono::NaiveDate;
use ulid::Ulid;

use crate::gateway::Gateway;
use crate::model::Instance;

use super::reconcile::resolve;
use super::ScheduleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelChange {
    Set(bool),
    Toggle,
}

/// Override fields to change on one instance; `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstancePatch {
    pub cancelled: Option<CancelChange>,
    pub capacity_override: Option<Option<u32>>,
    pub note: Option<Option<String>>,
}

impl InstancePatch {
    pub fn cancel(cancelled: bool) -> Self {
        Self {
            cancelled: Some(CancelChange::Set(cancelled)),
            ..Self::default()
        }
    }

    pub fn toggle() -> Self {
        Self {
            cancelled: Some(CancelChange::Toggle),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cancelled.is_none() && self.capacity_override.is_none() && self.note.is_none()
    }

    fn apply_to(&self, mut instance: Instance) -> Instance {
        match self.cancelled {
            Some(CancelChange::Set(c)) => instance.cancelled = c,
            Some(CancelChange::Toggle) => instance.cancelled = !instance.cancelled,
            None => {}
        }
        if let Some(capacity) = self.capacity_override {
            instance.capacity_override = capacity;
        }
        if let Some(note) = &self.note {
            instance.note = note.as_ref().map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        }
        instance
    }
}

/// Which instance an override addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceRef {
    Id(Ulid),
    /// Resolved (and created if needed) like the schedule does.
    Occurrence { rule_id: Ulid, date: NaiveDate },
}

/// Apply `patch` to the addressed instance and return the stored result.
pub async fn patch_instance<G: Gateway + ?Sized>(
    gateway: &G,
    at: InstanceRef,
    patch: &InstancePatch,
) -> Result<Instance, ScheduleError> {
    let current = match at {
        InstanceRef::Id(id) => gateway
            .get_instance(id)
            .await?
            .ok_or(ScheduleError::NotFound(id))?,
        InstanceRef::Occurrence { rule_id, date } => resolve(gateway, rule_id, date).await?,
    };
    let updated = gateway.update_instance(patch.apply_to(current)).await?;
    tracing::info!(
        instance = %updated.id,
        rule = %updated.rule_id,
        date = %updated.date,
        cancelled = updated.cancelled,
        capacity_override = ?updated.capacity_override,
        "instance override updated"
    );
    Ok(updated)
}

pub async fn cancel_instance<G: Gateway + ?Sized>(
    gateway: &G,
    instance_id: Ulid,
) -> Result<Instance, ScheduleError> {
    patch_instance(gateway, InstanceRef::Id(instance_id), &InstancePatch::cancel(true)).await
}

pub async fn restore_instance<G: Gateway + ?Sized>(
    gateway: &G,
    instance_id: Ulid,
) -> Result<Instance, ScheduleError> {
    patch_instance(gateway, InstanceRef::Id(instance_id), &InstancePatch::cancel(false)).await
}

/// Flip the cancelled flag of a rule's occurrence on `date`, creating its
/// instance first if the date was never materialized.
pub async fn toggle_override<G: Gateway + ?Sized>(
    gateway: &G,
    rule_id: Ulid,
    date: NaiveDate,
) -> Result<Instance, ScheduleError> {
    patch_instance(
        gateway,
        InstanceRef::Occurrence { rule_id, date },
        &InstancePatch::toggle(),
    )
    .await
}

pub async fn set_capacity_override<G: Gateway + ?Sized>(
    gateway: &G,
    instance_id: Ulid,
    capacity: Option<u32>,
) -> Result<Instance, ScheduleError> {
    let patch = InstancePatch {
        capacity_override: Some(capacity),
        ..InstancePatch::default()
    };
    patch_instance(gateway, InstanceRef::Id(instance_id), &patch).await
}

pub async fn set_instance_note<G: Gateway + ?Sized>(
    gateway: &G,
    instance_id: Ulid,
    note: Option<String>,
) -> Result<Instance, ScheduleError> {
    let patch = InstancePatch {
        note: Some(note),
        ..InstancePatch::default()
    };
    patch_instance(gateway, InstanceRef::Id(instance_id), &patch).await
}
