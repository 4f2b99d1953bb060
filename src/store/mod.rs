mod checks;
mod error;
mod gateway;
mod mutations;
mod queries;

pub use error::StoreError;
pub use queries::UnitRecord;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, OwnedRwLockWriteGuard, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

/// Registrations booked against one unit.
///
/// Every write that can change the unit's capacity verdict holds this
/// roster's write lock, so check-then-insert is serialized per unit.
#[derive(Debug)]
pub struct Roster {
    pub target: RegistrationTarget,
    /// Registration ids in booking order.
    pub registration_ids: Vec<Ulid>,
    /// Set when the unit is deleted; a waiter that wins the lock afterwards must bail.
    pub closed: bool,
}

impl Roster {
    fn new(target: RegistrationTarget) -> Self {
        Self {
            target,
            registration_ids: Vec::new(),
            closed: false,
        }
    }
}

pub type SharedRoster = Arc<RwLock<Roster>>;
pub(crate) type RosterGuard = OwnedRwLockWriteGuard<Roster>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit:
/// take the first append, drain whatever else is already queued, then one
/// fsync answers the whole batch.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }
                commit_batch(&mut wal, batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = std::time::Instant::now();

    let mut result = Ok(());
    for (event, _) in &batch {
        if let Err(e) = wal.append_buffered(event) {
            result = Err(e);
            break;
        }
    }
    // Flush even after an append error so stray bytes don't leak into the next batch.
    let flushed = wal.flush_sync();
    if result.is_ok() {
        result = flushed;
    }
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());

    for (_, tx) in batch {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => commit_batch(wal, vec![(event, response)]),
    }
}

/// The studio's transactional store: in-memory tables rebuilt from the WAL.
pub struct Store {
    pub(super) rules: DashMap<Ulid, RecurringRule>,
    pub(super) instances: DashMap<Ulid, Instance>,
    /// Unique index on (rule, date).
    pub(super) instance_keys: DashMap<(Ulid, NaiveDate), Ulid>,
    pub(super) one_time_sessions: DashMap<Ulid, Session>,
    pub(super) workshops: DashMap<Ulid, Session>,
    pub(super) registrations: DashMap<Ulid, Registration>,
    /// Registration ids taken by an insert that has not committed yet.
    pub(super) pending_registration_ids: DashMap<Ulid, ()>,
    pub(super) rosters: DashMap<RegistrationTarget, SharedRoster>,
    pub(super) messages: DashMap<Ulid, ContactMessage>,
    /// Serializes instance creation against rule deletion.
    pub(super) instance_gate: Mutex<()>,
    /// Mutations commit under `read`; compaction snapshots under `write`.
    pub(super) commit_gate: RwLock<()>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
}

impl Store {
    /// Replay the WAL at `wal_path` and start its writer task.
    pub fn open(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let replay = Wal::replay(&wal_path)?;
        if replay.discarded_tail {
            tracing::warn!("discarded torn tail of {}", wal_path.display());
        }
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = Self {
            rules: DashMap::new(),
            instances: DashMap::new(),
            instance_keys: DashMap::new(),
            one_time_sessions: DashMap::new(),
            workshops: DashMap::new(),
            registrations: DashMap::new(),
            pending_registration_ids: DashMap::new(),
            rosters: DashMap::new(),
            messages: DashMap::new(),
            instance_gate: Mutex::new(()),
            commit_gate: RwLock::new(()),
            wal_tx,
            notify,
        };

        // Sole owner of every roster here, so try_write_owned never contends.
        for event in &replay.events {
            let targets = store.dependent_targets(event);
            let mut guards = Vec::with_capacity(targets.len());
            for target in targets {
                if let Some(roster) = store.roster(&target)
                    && let Ok(guard) = roster.try_write_owned()
                {
                    guards.push(guard);
                }
            }
            if let Event::RegistrationCreated { registration } = event
                && guards.is_empty()
            {
                tracing::warn!("replay: dropping registration {} for missing unit", registration.id);
                continue;
            }
            store.apply(event, &mut guards);
        }
        tracing::info!(
            events = replay.events.len(),
            rules = store.rules.len(),
            instances = store.instances.len(),
            registrations = store.registrations.len(),
            "store replayed"
        );

        Ok(store)
    }

    pub(super) fn session_table(&self, kind: SessionKind) -> &DashMap<Ulid, Session> {
        match kind {
            SessionKind::OneTime => &self.one_time_sessions,
            SessionKind::Workshop => &self.workshops,
        }
    }

    pub(super) fn roster(&self, target: &RegistrationTarget) -> Option<SharedRoster> {
        self.rosters.get(target).map(|e| e.value().clone())
    }

    /// Rosters an event mutates when applied.
    fn dependent_targets(&self, event: &Event) -> Vec<RegistrationTarget> {
        match event {
            Event::RegistrationCreated { registration } => vec![registration.target],
            Event::RegistrationDeleted { target, .. } => vec![*target],
            Event::SessionDeleted { kind, id } => vec![kind.target(*id)],
            Event::RuleDeleted { id } => self.instance_targets_of(*id),
            _ => Vec::new(),
        }
    }

    pub(super) fn instance_targets_of(&self, rule_id: Ulid) -> Vec<RegistrationTarget> {
        let mut targets: Vec<RegistrationTarget> = self
            .instances
            .iter()
            .filter(|e| e.value().rule_id == rule_id)
            .map(|e| RegistrationTarget::Instance(*e.key()))
            .collect();
        targets.sort();
        targets
    }

    pub(super) fn instance_dates_of(&self, rule_id: Ulid) -> Vec<NaiveDate> {
        self.instances
            .iter()
            .filter(|e| e.value().rule_id == rule_id)
            .map(|e| e.value().date)
            .collect()
    }

    /// Write-lock several rosters in sorted order to prevent deadlocks.
    pub(super) async fn lock_rosters(&self, mut targets: Vec<RegistrationTarget>) -> Vec<RosterGuard> {
        targets.sort();
        targets.dedup();
        let mut guards = Vec::with_capacity(targets.len());
        for target in targets {
            if let Some(roster) = self.roster(&target) {
                guards.push(roster.write_owned().await);
            }
        }
        guards
    }

    /// Drain a roster being deleted along with its unit.
    fn close_roster(&self, roster: &mut Roster) {
        for id in roster.registration_ids.drain(..) {
            self.registrations.remove(&id);
        }
        roster.closed = true;
    }

    /// Apply an event to the tables. `rosters` must hold the write guards of
    /// every roster the event touches (see `dependent_targets`).
    pub(super) fn apply(&self, event: &Event, rosters: &mut [RosterGuard]) {
        match event {
            Event::RuleCreated { rule } | Event::RuleUpdated { rule } => {
                self.rules.insert(rule.id, rule.clone());
            }
            Event::RuleDeleted { id } => {
                for guard in rosters.iter_mut() {
                    self.close_roster(guard);
                    self.rosters.remove(&guard.target);
                }
                let doomed: Vec<(Ulid, NaiveDate)> = self
                    .instances
                    .iter()
                    .filter(|e| e.value().rule_id == *id)
                    .map(|e| (*e.key(), e.value().date))
                    .collect();
                for (instance_id, date) in doomed {
                    self.instances.remove(&instance_id);
                    self.instance_keys.remove(&(*id, date));
                    self.rosters.remove(&RegistrationTarget::Instance(instance_id));
                }
                self.rules.remove(id);
            }
            Event::InstanceCreated { instance } => {
                self.instance_keys
                    .insert((instance.rule_id, instance.date), instance.id);
                self.instances.insert(instance.id, instance.clone());
                let target = RegistrationTarget::Instance(instance.id);
                self.rosters
                    .entry(target)
                    .or_insert_with(|| Arc::new(RwLock::new(Roster::new(target))));
            }
            Event::InstanceUpdated { instance } => {
                self.instances.insert(instance.id, instance.clone());
            }
            Event::SessionCreated { session } => {
                self.session_table(session.kind)
                    .insert(session.id, session.clone());
                let target = session.target();
                self.rosters
                    .entry(target)
                    .or_insert_with(|| Arc::new(RwLock::new(Roster::new(target))));
            }
            Event::SessionUpdated { session } => {
                self.session_table(session.kind)
                    .insert(session.id, session.clone());
            }
            Event::SessionDeleted { kind, id } => {
                for guard in rosters.iter_mut() {
                    self.close_roster(guard);
                }
                self.rosters.remove(&kind.target(*id));
                self.session_table(*kind).remove(id);
            }
            Event::RegistrationCreated { registration } => {
                if let Some(guard) = rosters
                    .iter_mut()
                    .find(|g| g.target == registration.target)
                {
                    guard.registration_ids.push(registration.id);
                    self.registrations
                        .insert(registration.id, registration.clone());
                }
            }
            Event::RegistrationDeleted { id, target } => {
                if let Some(guard) = rosters.iter_mut().find(|g| g.target == *target) {
                    guard.registration_ids.retain(|r| r != id);
                }
                self.registrations.remove(id);
            }
            Event::MessageReceived { message } => {
                self.messages.insert(message.id, message.clone());
            }
            Event::MessageRead { id } => {
                if let Some(mut message) = self.messages.get_mut(id) {
                    message.read = true;
                }
            }
            Event::MessageDeleted { id } => {
                self.messages.remove(id);
            }
        }
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| StoreError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::WalError(e.to_string()))
    }

    /// WAL-append then apply, as one commit.
    pub(super) async fn persist_and_apply(
        &self,
        event: &Event,
        rosters: &mut [RosterGuard],
    ) -> Result<(), StoreError> {
        let _commit = self.commit_gate.read().await;
        self.wal_append(event).await?;
        self.apply(event, rosters);
        Ok(())
    }

    /// Rewrite the WAL as the minimal event list that recreates current state.
    pub async fn compact_wal(&self) -> Result<(), StoreError> {
        let _commit = self.commit_gate.write().await;

        let mut events = Vec::new();
        let mut rules: Vec<RecurringRule> = self.rules.iter().map(|e| e.value().clone()).collect();
        rules.sort_by_key(|r| r.id);
        events.extend(rules.into_iter().map(|rule| Event::RuleCreated { rule }));

        let mut instances: Vec<Instance> =
            self.instances.iter().map(|e| e.value().clone()).collect();
        instances.sort_by_key(|i| (i.date, i.id));
        events.extend(instances.into_iter().map(|instance| Event::InstanceCreated { instance }));

        for kind in [SessionKind::OneTime, SessionKind::Workshop] {
            let mut sessions: Vec<Session> = self
                .session_table(kind)
                .iter()
                .map(|e| e.value().clone())
                .collect();
            sessions.sort_by_key(|s| s.id);
            events.extend(sessions.into_iter().map(|session| Event::SessionCreated { session }));
        }

        let mut registrations: Vec<Registration> =
            self.registrations.iter().map(|e| e.value().clone()).collect();
        registrations.sort_by_key(|r| (r.created_at, r.id));
        events.extend(
            registrations
                .into_iter()
                .map(|registration| Event::RegistrationCreated { registration }),
        );

        let mut messages: Vec<ContactMessage> =
            self.messages.iter().map(|e| e.value().clone()).collect();
        messages.sort_by_key(|m| (m.received_at, m.id));
        events.extend(messages.into_iter().map(|message| Event::MessageReceived { message }));

        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| StoreError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::WalError(e.to_string()))?;
        metrics::counter!(crate::observability::WAL_COMPACTIONS_TOTAL).increment(1);
        tracing::info!(events = count, "WAL compacted");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
