use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "yogabook_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "yogabook_query_duration_seconds";

/// Counter: booking attempts. Labels: outcome.
pub const BOOKINGS_TOTAL: &str = "yogabook_bookings_total";

/// Histogram: schedule materialization latency in seconds.
pub const MATERIALIZE_DURATION_SECONDS: &str = "yogabook_materialize_duration_seconds";

// ── Schedule core ───────────────────────────────────────────────

/// Counter: instance rows created on first touch.
pub const INSTANCES_CREATED_TOTAL: &str = "yogabook_instances_created_total";

/// Counter: lost instance creation races the reconciler recovered from.
pub const RECONCILE_RACES_TOTAL: &str = "yogabook_reconcile_races_total";

/// Counter: courses whose lesson count could not be reached.
pub const EXPANSION_ANOMALIES_TOTAL: &str = "yogabook_expansion_anomalies_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "yogabook_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "yogabook_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "yogabook_connections_rejected_total";

/// Counter: statements refused to a non-admin login.
pub const AUTH_FAILURES_TOTAL: &str = "yogabook_auth_failures_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "yogabook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "yogabook_wal_flush_batch_size";

/// Counter: WAL compactions completed.
pub const WAL_COMPACTIONS_TOTAL: &str = "yogabook_wal_compactions_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> anyhow::Result<()> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::SelectSchedule { .. } => "select_schedule",
        Command::SelectRules => "select_rules",
        Command::SelectSessions { .. } => "select_sessions",
        Command::InsertRegistration { .. } => "insert_registration",
        Command::InsertMessage { .. } => "insert_message",
        Command::InsertRule { .. } => "insert_rule",
        Command::UpdateRule { .. } => "update_rule",
        Command::DeleteRule { .. } => "delete_rule",
        Command::InsertSession { .. } => "insert_session",
        Command::UpdateSession { .. } => "update_session",
        Command::DeleteSession { .. } => "delete_session",
        Command::UpdateInstance { .. } => "update_instance",
        Command::SelectInstances { .. } => "select_instances",
        Command::SelectRegistrations { .. } => "select_registrations",
        Command::DeleteRegistration { .. } => "delete_registration",
        Command::SelectMessages => "select_messages",
        Command::MarkMessageRead { .. } => "mark_message_read",
        Command::DeleteMessage { .. } => "delete_message",
    }
}
