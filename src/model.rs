use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Day of week, `0` = Sunday through `6` = Saturday.
pub type DayOfWeek = u8;

/// Price in minor currency units.
pub type Price = u32;

pub fn day_of_week(date: NaiveDate) -> DayOfWeek {
    date.weekday().num_days_from_sunday() as DayOfWeek
}

/// A weekly-repeating class template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringRule {
    pub id: Ulid,
    pub title: String,
    pub description: Option<String>,
    pub day_of_week: DayOfWeek,
    pub time_start: NaiveTime,
    pub time_end: NaiveTime,
    pub capacity: u32,
    /// Spots taken by phone/walk-in bookings outside the online flow.
    pub reserved_spots: u32,
    pub price: Price,
    pub active: bool,
    /// Finite course length. Requires `starts_on`.
    pub total_lessons: Option<u32>,
    /// First date the rule produces occurrences on.
    pub starts_on: Option<NaiveDate>,
}

/// One dated occurrence of a [`RecurringRule`], carrying its override state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: Ulid,
    pub rule_id: Ulid,
    pub date: NaiveDate,
    pub cancelled: bool,
    pub capacity_override: Option<u32>,
    pub note: Option<String>,
}

impl Instance {
    pub fn new(id: Ulid, rule_id: Ulid, date: NaiveDate) -> Self {
        Self {
            id,
            rule_id,
            date,
            cancelled: false,
            capacity_override: None,
            note: None,
        }
    }
}

/// The two single-date tables. Rows are structurally identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SessionKind {
    OneTime,
    Workshop,
}

impl SessionKind {
    pub fn unit_kind(self) -> UnitKind {
        match self {
            SessionKind::OneTime => UnitKind::OneTime,
            SessionKind::Workshop => UnitKind::Workshop,
        }
    }

    pub fn table_name(self) -> &'static str {
        match self {
            SessionKind::OneTime => "one_time_sessions",
            SessionKind::Workshop => "workshops",
        }
    }

    pub fn target(self, id: Ulid) -> RegistrationTarget {
        match self {
            SessionKind::OneTime => RegistrationTarget::Session(id),
            SessionKind::Workshop => RegistrationTarget::Workshop(id),
        }
    }
}

/// A one-time session or a workshop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: Ulid,
    pub kind: SessionKind,
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub time_start: NaiveTime,
    pub time_end: NaiveTime,
    pub capacity: u32,
    pub reserved_spots: u32,
    pub price: Price,
    pub active: bool,
}

impl Session {
    pub fn target(&self) -> RegistrationTarget {
        self.kind.target(self.id)
    }
}

/// Kind discriminator of a bookable unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitKind {
    Recurring,
    OneTime,
    Workshop,
}

impl UnitKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitKind::Recurring => "recurring",
            UnitKind::OneTime => "one_time",
            UnitKind::Workshop => "workshop",
        }
    }

    pub fn session_kind(self) -> Option<SessionKind> {
        match self {
            UnitKind::Recurring => None,
            UnitKind::OneTime => Some(SessionKind::OneTime),
            UnitKind::Workshop => Some(SessionKind::Workshop),
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown unit kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for UnitKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "recurring" => Ok(UnitKind::Recurring),
            "one_time" | "session" => Ok(UnitKind::OneTime),
            "workshop" => Ok(UnitKind::Workshop),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}

/// Which kinds a materialization includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindFilter {
    pub recurring: bool,
    pub one_time: bool,
    pub workshop: bool,
}

impl KindFilter {
    pub fn all() -> Self {
        Self {
            recurring: true,
            one_time: true,
            workshop: true,
        }
    }

    pub fn only(kind: UnitKind) -> Self {
        Self {
            recurring: kind == UnitKind::Recurring,
            one_time: kind == UnitKind::OneTime,
            workshop: kind == UnitKind::Workshop,
        }
    }

    pub fn none() -> Self {
        Self {
            recurring: false,
            one_time: false,
            workshop: false,
        }
    }

    pub fn with(mut self, kind: UnitKind) -> Self {
        match kind {
            UnitKind::Recurring => self.recurring = true,
            UnitKind::OneTime => self.one_time = true,
            UnitKind::Workshop => self.workshop = true,
        }
        self
    }

    pub fn intersect(self, other: Self) -> Self {
        Self {
            recurring: self.recurring && other.recurring,
            one_time: self.one_time && other.one_time,
            workshop: self.workshop && other.workshop,
        }
    }

    pub fn includes(&self, kind: UnitKind) -> bool {
        match kind {
            UnitKind::Recurring => self.recurring,
            UnitKind::OneTime => self.one_time,
            UnitKind::Workshop => self.workshop,
        }
    }
}

impl Default for KindFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// The unit a registration books. Exactly one is ever set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RegistrationTarget {
    Instance(Ulid),
    Session(Ulid),
    Workshop(Ulid),
}

impl RegistrationTarget {
    pub fn from_parts(kind: UnitKind, unit_id: Ulid) -> Self {
        match kind {
            UnitKind::Recurring => RegistrationTarget::Instance(unit_id),
            UnitKind::OneTime => RegistrationTarget::Session(unit_id),
            UnitKind::Workshop => RegistrationTarget::Workshop(unit_id),
        }
    }

    pub fn unit_id(&self) -> Ulid {
        match self {
            RegistrationTarget::Instance(id)
            | RegistrationTarget::Session(id)
            | RegistrationTarget::Workshop(id) => *id,
        }
    }

    pub fn kind(&self) -> UnitKind {
        match self {
            RegistrationTarget::Instance(_) => UnitKind::Recurring,
            RegistrationTarget::Session(_) => UnitKind::OneTime,
            RegistrationTarget::Workshop(_) => UnitKind::Workshop,
        }
    }
}

impl fmt::Display for RegistrationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.unit_id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: Ulid,
    pub target: RegistrationTarget,
    pub participant: Participant,
    pub created_at: DateTime<Utc>,
}

/// A message left through the public contact form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMessage {
    pub id: Ulid,
    pub name: String,
    pub email: String,
    pub body: String,
    pub read: bool,
    pub received_at: DateTime<Utc>,
}

/// One row of a materialized schedule. Built per query, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleItem {
    pub kind: UnitKind,
    /// What a registration against this row books.
    pub target: RegistrationTarget,
    /// Rule id for recurring rows, session id otherwise.
    pub source_id: Ulid,
    pub date: NaiveDate,
    pub time_start: NaiveTime,
    pub time_end: NaiveTime,
    pub title: String,
    pub description: Option<String>,
    pub price: Price,
    pub note: Option<String>,
    pub capacity: u32,
    /// Online registrations plus reserved spots.
    pub registered_count: u32,
}

impl ScheduleItem {
    pub fn remaining_spots(&self) -> u32 {
        self.capacity.saturating_sub(self.registered_count)
    }

    pub fn is_full(&self) -> bool {
        self.remaining_spots() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub items: Vec<ScheduleItem>,
}

/// The event types, flat with no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RuleCreated { rule: RecurringRule },
    RuleUpdated { rule: RecurringRule },
    /// Cascades to the rule's instances and their registrations.
    RuleDeleted { id: Ulid },
    InstanceCreated { instance: Instance },
    InstanceUpdated { instance: Instance },
    SessionCreated { session: Session },
    SessionUpdated { session: Session },
    /// Cascades to the session's registrations.
    SessionDeleted { kind: SessionKind, id: Ulid },
    RegistrationCreated { registration: Registration },
    RegistrationDeleted { id: Ulid, target: RegistrationTarget },
    MessageReceived { message: ContactMessage },
    MessageRead { id: Ulid },
    MessageDeleted { id: Ulid },
}
