//! Weekly date expansion.

use chrono::{Days, NaiveDate};

use crate::limits::MAX_EXPANSION_SCAN_DAYS;
use crate::model::{day_of_week, DayOfWeek, RecurringRule};

/// A lesson count that the scan ceiling cut short.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpansionError {
    #[error(
        "only {} of {} lessons found within {} days",
        .found.len(),
        .requested,
        MAX_EXPANSION_SCAN_DAYS
    )]
    CountUnreachable {
        requested: u32,
        found: Vec<NaiveDate>,
    },
}

/// First date on or after `from` falling on `dow`.
fn first_on_or_after(dow: DayOfWeek, from: NaiveDate) -> Option<NaiveDate> {
    if dow > 6 {
        return None;
    }
    let offset = (i64::from(dow) - i64::from(day_of_week(from))).rem_euclid(7);
    from.checked_add_days(Days::new(offset as u64))
}

/// Every date in `[start, end]` (inclusive) whose weekday is `dow`.
pub fn expand(dow: DayOfWeek, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    if start > end {
        return dates;
    }
    let mut next = first_on_or_after(dow, start);
    while let Some(date) = next.filter(|d| *d <= end) {
        dates.push(date);
        next = date.checked_add_days(Days::new(7));
    }
    dates
}

/// The first `count` dates on or after `start` falling on `dow`.
///
/// Walks day by day and gives up after [`MAX_EXPANSION_SCAN_DAYS`], returning
/// what it found so far inside the error.
pub fn expand_count(
    dow: DayOfWeek,
    start: NaiveDate,
    count: u32,
) -> Result<Vec<NaiveDate>, ExpansionError> {
    let mut found = Vec::new();
    let mut day = Some(start);
    for _ in 0..MAX_EXPANSION_SCAN_DAYS {
        if found.len() >= count as usize {
            break;
        }
        let Some(date) = day else { break };
        if day_of_week(date) == dow {
            found.push(date);
        }
        day = date.succ_opt();
    }
    if found.len() < count as usize {
        return Err(ExpansionError::CountUnreachable {
            requested: count,
            found,
        });
    }
    Ok(found)
}

/// Dates a rule occurs on within `[start, end]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrences {
    pub dates: Vec<NaiveDate>,
    /// Set when a finite course could not be fully laid out.
    pub anomaly: Option<ExpansionError>,
}

/// Occurrences of `rule` within `[start, end]`.
///
/// A finite course (`total_lessons` with `starts_on`) is laid out from its
/// first date and then clipped to the range; an open rule expands weekly,
/// never before `starts_on`.
pub fn occurrences(rule: &RecurringRule, start: NaiveDate, end: NaiveDate) -> Occurrences {
    match (rule.total_lessons, rule.starts_on) {
        (Some(count), Some(first)) => {
            let (all, anomaly) = match expand_count(rule.day_of_week, first, count) {
                Ok(dates) => (dates, None),
                Err(ExpansionError::CountUnreachable { requested, found }) => (
                    found.clone(),
                    Some(ExpansionError::CountUnreachable { requested, found }),
                ),
            };
            Occurrences {
                dates: all.into_iter().filter(|d| *d >= start && *d <= end).collect(),
                anomaly,
            }
        }
        (_, starts_on) => {
            let lower = starts_on.map_or(start, |s| s.max(start));
            Occurrences {
                dates: expand(rule.day_of_week, lower, end),
                anomaly: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use ulid::Ulid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rule(dow: DayOfWeek, total_lessons: Option<u32>, starts_on: Option<NaiveDate>) -> RecurringRule {
        RecurringRule {
            id: Ulid::new(),
            title: "Hatha".into(),
            description: None,
            day_of_week: dow,
            time_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            time_end: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            capacity: 12,
            reserved_spots: 0,
            price: 2000,
            active: true,
            total_lessons,
            starts_on,
        }
    }

    #[test]
    fn expand_march_wednesdays() {
        let got = expand(3, date(2025, 3, 1), date(2025, 3, 31));
        assert_eq!(
            got,
            vec![date(2025, 3, 5), date(2025, 3, 12), date(2025, 3, 19), date(2025, 3, 26)]
        );
    }

    #[test]
    fn expand_single_day_range() {
        assert_eq!(expand(3, date(2025, 3, 5), date(2025, 3, 5)), vec![date(2025, 3, 5)]);
        assert!(expand(4, date(2025, 3, 5), date(2025, 3, 5)).is_empty());
    }

    #[test]
    fn expand_empty_and_short_ranges() {
        assert!(expand(3, date(2025, 3, 31), date(2025, 3, 1)).is_empty());
        // Thu..Tue holds no Wednesday
        assert!(expand(3, date(2025, 3, 6), date(2025, 3, 11)).is_empty());
        assert!(expand(7, date(2025, 3, 1), date(2025, 3, 31)).is_empty());
    }

    #[test]
    fn expand_matches_count_formula() {
        let start = date(2024, 12, 20);
        for dow in 0..=6u8 {
            for span in 0..60u64 {
                let end = start.checked_add_days(Days::new(span)).unwrap();
                let got = expand(dow, start, end);
                for d in &got {
                    assert_eq!(day_of_week(*d), dow);
                    assert!(*d >= start && *d <= end);
                }
                let expected = match first_on_or_after(dow, start).filter(|f| *f <= end) {
                    Some(first) => (end - first).num_days() / 7 + 1,
                    None => 0,
                };
                assert_eq!(got.len() as i64, expected, "dow {dow} span {span}");
            }
        }
    }

    #[test]
    fn expand_count_walks_from_start() {
        let got = expand_count(0, date(2025, 3, 5), 3).unwrap();
        assert_eq!(got, vec![date(2025, 3, 9), date(2025, 3, 16), date(2025, 3, 23)]);
        assert_eq!(expand_count(0, date(2025, 3, 5), 0).unwrap(), Vec::<NaiveDate>::new());
    }

    #[test]
    fn expand_count_stops_at_ceiling() {
        match expand_count(3, date(2025, 1, 1), 60) {
            Err(ExpansionError::CountUnreachable { requested, found }) => {
                assert_eq!(requested, 60);
                assert_eq!(found.len(), 53);
                assert_eq!(found[0], date(2025, 1, 1));
            }
            other => panic!("expected CountUnreachable, got {other:?}"),
        }
        assert!(expand_count(9, date(2025, 1, 1), 1).is_err());
    }

    #[test]
    fn open_rule_respects_starts_on() {
        let r = rule(3, None, Some(date(2025, 3, 15)));
        let occ = occurrences(&r, date(2025, 3, 1), date(2025, 3, 31));
        assert_eq!(occ.dates, vec![date(2025, 3, 19), date(2025, 3, 26)]);
        assert!(occ.anomaly.is_none());
    }

    #[test]
    fn finite_course_is_clipped_to_range() {
        // four lessons: Mar 5, 12, 19, 26
        let r = rule(3, Some(4), Some(date(2025, 3, 1)));
        let occ = occurrences(&r, date(2025, 3, 10), date(2025, 4, 30));
        assert_eq!(occ.dates, vec![date(2025, 3, 12), date(2025, 3, 19), date(2025, 3, 26)]);
        assert!(occ.anomaly.is_none());
    }

    #[test]
    fn unreachable_course_keeps_partial_dates() {
        let r = rule(3, Some(100), Some(date(2025, 1, 1)));
        let occ = occurrences(&r, date(2025, 1, 1), date(2025, 1, 31));
        assert_eq!(occ.dates.len(), 5);
        assert!(matches!(
            occ.anomaly,
            Some(ExpansionError::CountUnreachable { requested: 100, .. })
        ));
    }
}
