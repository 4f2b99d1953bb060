use chrono::{NaiveDate, NaiveTime};

use crate::model::*;

/// A bookable unit with everything needed to judge its capacity.
#[derive(Debug, Clone, Copy)]
pub enum BookableUnit<'a> {
    Recurring {
        rule: &'a RecurringRule,
        instance: &'a Instance,
    },
    Single(&'a Session),
}

impl BookableUnit<'_> {
    pub fn target(&self) -> RegistrationTarget {
        match self {
            BookableUnit::Recurring { instance, .. } => RegistrationTarget::Instance(instance.id),
            BookableUnit::Single(session) => session.target(),
        }
    }

    pub fn kind(&self) -> UnitKind {
        match self {
            BookableUnit::Recurring { .. } => UnitKind::Recurring,
            BookableUnit::Single(session) => session.kind.unit_kind(),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            BookableUnit::Recurring { rule, .. } => &rule.title,
            BookableUnit::Single(session) => &session.title,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            BookableUnit::Recurring { instance, .. } => instance.date,
            BookableUnit::Single(session) => session.date,
        }
    }

    pub fn time_start(&self) -> NaiveTime {
        match self {
            BookableUnit::Recurring { rule, .. } => rule.time_start,
            BookableUnit::Single(session) => session.time_start,
        }
    }

    /// Cancelled instances and inactive rules/sessions take no bookings.
    pub fn is_bookable(&self) -> bool {
        match self {
            BookableUnit::Recurring { rule, instance } => rule.active && !instance.cancelled,
            BookableUnit::Single(session) => session.active,
        }
    }

    pub fn reserved_spots(&self) -> u32 {
        match self {
            BookableUnit::Recurring { rule, .. } => rule.reserved_spots,
            BookableUnit::Single(session) => session.reserved_spots,
        }
    }
}

/// `capacity_override` wins over the rule's base capacity.
pub fn effective_capacity(unit: &BookableUnit<'_>) -> u32 {
    match unit {
        BookableUnit::Recurring { rule, instance } => {
            instance.capacity_override.unwrap_or(rule.capacity)
        }
        BookableUnit::Single(session) => session.capacity,
    }
}

/// Online registrations plus reserved spots. Not clamped to capacity.
pub fn effective_registered_count(unit: &BookableUnit<'_>, online: u32) -> u32 {
    online.saturating_add(unit.reserved_spots())
}

/// Capacity verdict for one unit at one moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupancy {
    pub capacity: u32,
    pub registered: u32,
}

impl Occupancy {
    pub fn of(unit: &BookableUnit<'_>, online: u32) -> Self {
        Self {
            capacity: effective_capacity(unit),
            registered: effective_registered_count(unit, online),
        }
    }

    pub fn remaining_spots(&self) -> u32 {
        self.capacity.saturating_sub(self.registered)
    }

    pub fn is_full(&self) -> bool {
        self.remaining_spots() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn wednesday_rule(capacity: u32, reserved_spots: u32) -> RecurringRule {
        RecurringRule {
            id: Ulid::new(),
            title: "Vinyasa".into(),
            description: None,
            day_of_week: 3,
            time_start: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            time_end: NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
            capacity,
            reserved_spots,
            price: 2000,
            active: true,
            total_lessons: None,
            starts_on: None,
        }
    }

    fn instance_of(rule: &RecurringRule) -> Instance {
        Instance::new(
            Ulid::new(),
            rule.id,
            NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(),
        )
    }

    fn workshop(capacity: u32, reserved_spots: u32, active: bool) -> Session {
        Session {
            id: Ulid::new(),
            kind: SessionKind::Workshop,
            title: "Inversions".into(),
            description: None,
            date: NaiveDate::from_ymd_opt(2025, 3, 8).unwrap(),
            time_start: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            time_end: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            capacity,
            reserved_spots,
            price: 4500,
            active,
        }
    }

    #[test]
    fn reserved_spots_count_as_registered() {
        let rule = wednesday_rule(10, 2);
        let instance = instance_of(&rule);
        let unit = BookableUnit::Recurring { rule: &rule, instance: &instance };

        let occ = Occupancy::of(&unit, 3);
        assert_eq!(occ.registered, 5);
        assert_eq!(occ.remaining_spots(), 5);
        assert!(!occ.is_full());
    }

    #[test]
    fn capacity_override_wins() {
        let rule = wednesday_rule(10, 0);
        let mut instance = instance_of(&rule);
        instance.capacity_override = Some(4);
        let unit = BookableUnit::Recurring { rule: &rule, instance: &instance };

        assert_eq!(effective_capacity(&unit), 4);
        assert!(Occupancy::of(&unit, 4).is_full());
    }

    #[test]
    fn zero_override_closes_the_class() {
        let rule = wednesday_rule(10, 0);
        let mut instance = instance_of(&rule);
        instance.capacity_override = Some(0);
        let unit = BookableUnit::Recurring { rule: &rule, instance: &instance };
        assert!(Occupancy::of(&unit, 0).is_full());
    }

    #[test]
    fn reserved_above_capacity_is_not_clamped() {
        let session = workshop(5, 7, true);
        let unit = BookableUnit::Single(&session);
        let occ = Occupancy::of(&unit, 1);
        assert_eq!(occ.registered, 8);
        assert_eq!(occ.remaining_spots(), 0);
        assert!(occ.is_full());
    }

    #[test]
    fn bookability() {
        let rule = wednesday_rule(10, 0);
        let mut instance = instance_of(&rule);
        assert!(BookableUnit::Recurring { rule: &rule, instance: &instance }.is_bookable());
        instance.cancelled = true;
        assert!(!BookableUnit::Recurring { rule: &rule, instance: &instance }.is_bookable());

        let inactive = workshop(5, 0, false);
        assert!(!BookableUnit::Single(&inactive).is_bookable());
        assert_eq!(BookableUnit::Single(&inactive).kind(), UnitKind::Workshop);
        assert_eq!(
            BookableUnit::Single(&inactive).target(),
            RegistrationTarget::Workshop(inactive.id)
        );
    }
}
