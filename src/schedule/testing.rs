//! Shared fixtures for the schedule tests: a real store on a temp WAL and a
//! gateway wrapper that injects faults.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use ulid::Ulid;

use crate::gateway::Gateway;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::store::{Store, StoreError};

pub fn test_store(name: &str) -> Store {
    let dir = std::env::temp_dir().join("yogabook_test_schedule");
    std::fs::create_dir_all(&dir).unwrap();
    let path: PathBuf = dir.join(name);
    let _ = std::fs::remove_file(&path);
    Store::open(path, Arc::new(NotifyHub::new())).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn weekly_rule(dow: DayOfWeek, start: NaiveTime, end: NaiveTime, capacity: u32) -> RecurringRule {
    RecurringRule {
        id: Ulid::new(),
        title: "Vinyasa".into(),
        description: None,
        day_of_week: dow,
        time_start: start,
        time_end: end,
        capacity,
        reserved_spots: 0,
        price: 2500,
        active: true,
        total_lessons: None,
        starts_on: None,
    }
}

pub fn session(kind: SessionKind, on: NaiveDate, start: NaiveTime, capacity: u32) -> Session {
    Session {
        id: Ulid::new(),
        kind,
        title: match kind {
            SessionKind::OneTime => "Full Moon Flow".into(),
            SessionKind::Workshop => "Arm Balances".into(),
        },
        description: None,
        date: on,
        time_start: start,
        time_end: start + chrono::TimeDelta::minutes(90),
        capacity,
        reserved_spots: 0,
        price: 3500,
        active: true,
    }
}

pub fn participant(name: &str) -> Participant {
    Participant {
        name: name.into(),
        email: format!("{}@example.com", name.to_lowercase()),
        phone: None,
        note: None,
    }
}

pub fn registration(target: RegistrationTarget, name: &str) -> Registration {
    Registration {
        id: Ulid::new(),
        target,
        participant: participant(name),
        created_at: Utc::now(),
    }
}

/// Wraps a store and misbehaves on request.
pub struct FaultyGateway {
    pub inner: Store,
    /// `find_instance` answers `None` this many more times.
    pub stale_lookups: AtomicU32,
    /// `get_or_create_instance` creates the row but reports a unique
    /// violation this many more times, as if another writer won.
    pub lost_races: AtomicU32,
    pub sessions_down: AtomicBool,
    pub counts_down: AtomicBool,
}

impl FaultyGateway {
    pub fn new(inner: Store) -> Self {
        Self {
            inner,
            stale_lookups: AtomicU32::new(0),
            lost_races: AtomicU32::new(0),
            sessions_down: AtomicBool::new(false),
            counts_down: AtomicBool::new(false),
        }
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn unreachable() -> StoreError {
    StoreError::WalError("connection reset".into())
}

#[async_trait]
impl Gateway for FaultyGateway {
    async fn active_rules(&self) -> Result<Vec<RecurringRule>, StoreError> {
        self.inner.active_rules().await
    }

    async fn get_rule(&self, id: Ulid) -> Result<Option<RecurringRule>, StoreError> {
        Gateway::get_rule(&self.inner, id).await
    }

    async fn get_instance(&self, id: Ulid) -> Result<Option<Instance>, StoreError> {
        Gateway::get_instance(&self.inner, id).await
    }

    async fn find_instance(&self, rule_id: Ulid, date: NaiveDate) -> Result<Option<Instance>, StoreError> {
        if take_one(&self.stale_lookups) {
            return Ok(None);
        }
        self.inner.find_instance(rule_id, date).await
    }

    async fn get_or_create_instance(&self, rule_id: Ulid, date: NaiveDate) -> Result<Instance, StoreError> {
        let instance = self.inner.get_or_create_instance(rule_id, date).await?;
        if take_one(&self.lost_races) {
            return Err(StoreError::DuplicateInstance { rule_id, date });
        }
        Ok(instance)
    }

    async fn update_instance(&self, instance: Instance) -> Result<Instance, StoreError> {
        Gateway::update_instance(&self.inner, instance).await
    }

    async fn get_session(&self, kind: SessionKind, id: Ulid) -> Result<Option<Session>, StoreError> {
        Gateway::get_session(&self.inner, kind, id).await
    }

    async fn active_sessions(
        &self,
        kind: SessionKind,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Session>, StoreError> {
        if self.sessions_down.load(Ordering::SeqCst) {
            return Err(unreachable());
        }
        self.inner.active_sessions(kind, start, end).await
    }

    async fn count_registrations(&self, target: RegistrationTarget) -> Result<u32, StoreError> {
        if self.counts_down.load(Ordering::SeqCst) {
            return Err(unreachable());
        }
        Gateway::count_registrations(&self.inner, target).await
    }

    async fn check_capacity(&self, target: RegistrationTarget) -> Result<bool, StoreError> {
        Gateway::check_capacity(&self.inner, target).await
    }

    async fn insert_registration(&self, registration: Registration) -> Result<Registration, StoreError> {
        Gateway::insert_registration(&self.inner, registration).await
    }
}
