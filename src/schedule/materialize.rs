//! The read path: rules, overrides and single-date sessions merged into one
//! date-ordered schedule.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::NaiveDate;

use crate::gateway::Gateway;
use crate::limits::MAX_RANGE_DAYS;
use crate::model::*;
use crate::validate::ValidationErrors;

use super::capacity::{BookableUnit, Occupancy};
use super::dates::occurrences;
use super::reconcile::resolve;
use super::ScheduleError;

fn schedule_item(unit: &BookableUnit<'_>, online: u32) -> ScheduleItem {
    let occupancy = Occupancy::of(unit, online);
    let (source_id, time_end, description, price, note) = match unit {
        BookableUnit::Recurring { rule, instance } => (
            rule.id,
            rule.time_end,
            rule.description.clone(),
            rule.price,
            instance.note.clone(),
        ),
        BookableUnit::Single(session) => (
            session.id,
            session.time_end,
            session.description.clone(),
            session.price,
            None,
        ),
    };
    ScheduleItem {
        kind: unit.kind(),
        target: unit.target(),
        source_id,
        date: unit.date(),
        time_start: unit.time_start(),
        time_end,
        title: unit.title().to_string(),
        description,
        price,
        note,
        capacity: occupancy.capacity,
        registered_count: occupancy.registered,
    }
}

/// Group by date ascending; within a date, stable by start time.
fn group_by_date(items: Vec<ScheduleItem>) -> Vec<DaySchedule> {
    let mut days: BTreeMap<NaiveDate, Vec<ScheduleItem>> = BTreeMap::new();
    for item in items {
        days.entry(item.date).or_default().push(item);
    }
    days.into_iter()
        .map(|(date, mut items)| {
            items.sort_by_key(|i| i.time_start);
            DaySchedule { date, items }
        })
        .collect()
}

/// The bookable schedule for `[start, end]`.
///
/// Resolves (and if needed creates) an instance for every rule occurrence
/// in range. Cancelled instances are left out. Any gateway failure aborts
/// the whole call.
pub async fn materialize<G: Gateway + ?Sized>(
    gateway: &G,
    start: NaiveDate,
    end: NaiveDate,
    filter: KindFilter,
) -> Result<Vec<DaySchedule>, ScheduleError> {
    if start > end {
        return Ok(Vec::new());
    }
    if (end - start).num_days() >= MAX_RANGE_DAYS {
        return Err(ValidationErrors::single("range", "date range too wide").into());
    }
    let started = Instant::now();
    let mut items = Vec::new();

    if filter.includes(UnitKind::Recurring) {
        for rule in gateway.active_rules().await? {
            let occ = occurrences(&rule, start, end);
            if let Some(anomaly) = &occ.anomaly {
                metrics::counter!(crate::observability::EXPANSION_ANOMALIES_TOTAL).increment(1);
                tracing::warn!(rule = %rule.id, title = %rule.title, "{anomaly}");
            }
            for date in occ.dates {
                let instance = resolve(gateway, rule.id, date).await?;
                if instance.cancelled {
                    continue;
                }
                let unit = BookableUnit::Recurring {
                    rule: &rule,
                    instance: &instance,
                };
                let online = gateway.count_registrations(unit.target()).await?;
                items.push(schedule_item(&unit, online));
            }
        }
    }

    for kind in [SessionKind::OneTime, SessionKind::Workshop] {
        if !filter.includes(kind.unit_kind()) {
            continue;
        }
        for session in gateway.active_sessions(kind, start, end).await? {
            let unit = BookableUnit::Single(&session);
            let online = gateway.count_registrations(unit.target()).await?;
            items.push(schedule_item(&unit, online));
        }
    }

    let days = group_by_date(items);
    metrics::histogram!(crate::observability::MATERIALIZE_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());
    tracing::debug!(%start, %end, days = days.len(), "schedule materialized");
    Ok(days)
}
