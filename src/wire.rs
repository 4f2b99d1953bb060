use std::fmt::Debug;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{NaiveTime, Utc};
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type, METADATA_USER};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::data::DataRow;
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;

use crate::auth::{Principal, StudioAuthSource};
use crate::model::*;
use crate::observability;
use crate::schedule::{self, ScheduleError};
use crate::sql::{self, Command, SqlError};
use crate::store::{Store, StoreError};
use crate::validate;

pub struct StudioHandler {
    store: Arc<Store>,
    query_parser: Arc<StudioQueryParser>,
}

impl StudioHandler {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            query_parser: Arc::new(StudioQueryParser),
        }
    }

    fn principal<C: ClientInfo>(client: &C) -> Principal {
        Principal::for_user(client.metadata().get(METADATA_USER).map(String::as_str))
    }

    /// Parse, authorize, execute and record one statement.
    async fn run(
        &self,
        principal: Principal,
        query: &str,
        format: Option<&Format>,
    ) -> PgWireResult<Response> {
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        let label = observability::command_label(&cmd);

        if cmd.requires_admin() && principal != Principal::Admin {
            metrics::counter!(observability::AUTH_FAILURES_TOTAL, "command" => label).increment(1);
            tracing::warn!(command = label, "statement refused to non-admin login");
            return Err(user_error("42501", format!("{label} requires the admin login")));
        }

        let started = Instant::now();
        let result = self.execute_command(principal, cmd, format).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn execute_command(
        &self,
        principal: Principal,
        cmd: Command,
        format: Option<&Format>,
    ) -> PgWireResult<Response> {
        let store = self.store.as_ref();
        match cmd {
            // ── Public ───────────────────────────────────────
            Command::SelectSchedule { start, end, kinds } => {
                let days = schedule::materialize(store, start, end, kinds)
                    .await
                    .map_err(schedule_err)?;
                let items = days.into_iter().flat_map(|day| day.items);
                query_response(schedule_schema(format), items, |enc, item| {
                    enc.encode_field(&item.date.to_string())?;
                    enc.encode_field(&item.kind.as_str())?;
                    enc.encode_field(&item.target.unit_id().to_string())?;
                    enc.encode_field(&item.source_id.to_string())?;
                    enc.encode_field(&hhmm(item.time_start))?;
                    enc.encode_field(&hhmm(item.time_end))?;
                    enc.encode_field(&item.title)?;
                    enc.encode_field(&item.description)?;
                    enc.encode_field(&i64::from(item.price))?;
                    enc.encode_field(&item.note)?;
                    enc.encode_field(&i64::from(item.capacity))?;
                    enc.encode_field(&i64::from(item.registered_count))?;
                    enc.encode_field(&i64::from(item.remaining_spots()))?;
                    enc.encode_field(&item.is_full())
                })
            }
            Command::SelectRules => {
                let rules = store
                    .list_rules()
                    .into_iter()
                    .filter(|r| r.active || principal == Principal::Admin);
                query_response(rules_schema(format), rules, |enc, rule| {
                    enc.encode_field(&rule.id.to_string())?;
                    enc.encode_field(&rule.title)?;
                    enc.encode_field(&rule.description)?;
                    enc.encode_field(&i64::from(rule.day_of_week))?;
                    enc.encode_field(&hhmm(rule.time_start))?;
                    enc.encode_field(&hhmm(rule.time_end))?;
                    enc.encode_field(&i64::from(rule.capacity))?;
                    enc.encode_field(&i64::from(rule.reserved_spots))?;
                    enc.encode_field(&i64::from(rule.price))?;
                    enc.encode_field(&rule.active)?;
                    enc.encode_field(&rule.total_lessons.map(i64::from))?;
                    enc.encode_field(&rule.starts_on.map(|d| d.to_string()))
                })
            }
            Command::SelectSessions { kind } => {
                let sessions = store
                    .list_sessions(kind)
                    .into_iter()
                    .filter(|s| s.active || principal == Principal::Admin);
                query_response(sessions_schema(format), sessions, |enc, s| {
                    enc.encode_field(&s.id.to_string())?;
                    enc.encode_field(&s.kind.unit_kind().as_str())?;
                    enc.encode_field(&s.title)?;
                    enc.encode_field(&s.description)?;
                    enc.encode_field(&s.date.to_string())?;
                    enc.encode_field(&hhmm(s.time_start))?;
                    enc.encode_field(&hhmm(s.time_end))?;
                    enc.encode_field(&i64::from(s.capacity))?;
                    enc.encode_field(&i64::from(s.reserved_spots))?;
                    enc.encode_field(&i64::from(s.price))?;
                    enc.encode_field(&s.active)
                })
            }
            Command::InsertRegistration {
                id,
                target,
                participant,
            } => {
                schedule::book_with_id(store, id, target, participant)
                    .await
                    .map_err(schedule_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::InsertMessage {
                id,
                name,
                email,
                body,
            } => {
                let (name, email, body) = validate::contact(&name, &email, &body)
                    .map_err(|e| schedule_err(e.into()))?;
                store
                    .submit_message(ContactMessage {
                        id,
                        name,
                        email,
                        body,
                        read: false,
                        received_at: Utc::now(),
                    })
                    .await
                    .map_err(store_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }

            // ── Admin ────────────────────────────────────────
            Command::InsertRule { rule } => {
                store.create_rule(rule).await.map_err(store_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::UpdateRule { id, set } => {
                let mut rule = store.rule(id).ok_or(StoreError::NotFound(id)).map_err(store_err)?;
                sql::apply_rule(&mut rule, &set).map_err(sql_err)?;
                store.update_rule(rule).await.map_err(store_err)?;
                Ok(Response::Execution(Tag::new("UPDATE").with_rows(1)))
            }
            Command::DeleteRule { id } => {
                store.delete_rule(id).await.map_err(store_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::InsertSession { session } => {
                store.create_session(session).await.map_err(store_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::UpdateSession { kind, id, set } => {
                let mut session = store
                    .session(kind, id)
                    .ok_or(StoreError::NotFound(id))
                    .map_err(store_err)?;
                sql::apply_session(&mut session, &set).map_err(sql_err)?;
                store.update_session(session).await.map_err(store_err)?;
                Ok(Response::Execution(Tag::new("UPDATE").with_rows(1)))
            }
            Command::DeleteSession { kind, id } => {
                store.delete_session(kind, id).await.map_err(store_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::UpdateInstance { at, patch } => {
                schedule::patch_instance(store, at, &patch)
                    .await
                    .map_err(schedule_err)?;
                Ok(Response::Execution(Tag::new("UPDATE").with_rows(1)))
            }
            Command::SelectInstances { rule_id } => {
                if store.rule(rule_id).is_none() {
                    return Err(store_err(StoreError::NotFound(rule_id)));
                }
                query_response(instances_schema(format), store.instances_of(rule_id), |enc, i| {
                    enc.encode_field(&i.id.to_string())?;
                    enc.encode_field(&i.rule_id.to_string())?;
                    enc.encode_field(&i.date.to_string())?;
                    enc.encode_field(&i.cancelled)?;
                    enc.encode_field(&i.capacity_override.map(i64::from))?;
                    enc.encode_field(&i.note)
                })
            }
            Command::SelectRegistrations { target } => {
                let registrations = store.registrations_for(target).await.map_err(store_err)?;
                query_response(registrations_schema(format), registrations, |enc, r| {
                    enc.encode_field(&r.id.to_string())?;
                    enc.encode_field(&r.target.kind().as_str())?;
                    enc.encode_field(&r.target.unit_id().to_string())?;
                    enc.encode_field(&r.participant.name)?;
                    enc.encode_field(&r.participant.email)?;
                    enc.encode_field(&r.participant.phone)?;
                    enc.encode_field(&r.participant.note)?;
                    enc.encode_field(&r.created_at.to_rfc3339())
                })
            }
            Command::DeleteRegistration { id } => {
                store.delete_registration(id).await.map_err(store_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::SelectMessages => {
                query_response(messages_schema(format), store.list_messages(), |enc, m| {
                    enc.encode_field(&m.id.to_string())?;
                    enc.encode_field(&m.name)?;
                    enc.encode_field(&m.email)?;
                    enc.encode_field(&m.body)?;
                    enc.encode_field(&m.read)?;
                    enc.encode_field(&m.received_at.to_rfc3339())
                })
            }
            Command::MarkMessageRead { id } => {
                store.mark_message_read(id).await.map_err(store_err)?;
                Ok(Response::Execution(Tag::new("UPDATE").with_rows(1)))
            }
            Command::DeleteMessage { id } => {
                store.delete_message(id).await.map_err(store_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
        }
    }
}

fn hhmm(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

fn query_response<T>(
    schema: Vec<FieldInfo>,
    items: impl IntoIterator<Item = T>,
    encode: impl Fn(&mut DataRowEncoder, T) -> PgWireResult<()>,
) -> PgWireResult<Response> {
    let schema = Arc::new(schema);
    let rows: Vec<PgWireResult<DataRow>> = items
        .into_iter()
        .map(|item| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encode(&mut encoder, item)?;
            Ok(encoder.take_row())
        })
        .collect();
    Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
}

// ── Result schemas ───────────────────────────────────────────────

fn fields(columns: &[(&str, Type)], format: Option<&Format>) -> Vec<FieldInfo> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, (name, ty))| {
            let field_format = format.map_or(FieldFormat::Text, |f| f.format_for(idx));
            FieldInfo::new((*name).into(), None, None, ty.clone(), field_format)
        })
        .collect()
}

fn schedule_schema(format: Option<&Format>) -> Vec<FieldInfo> {
    fields(
        &[
            ("date", Type::VARCHAR),
            ("kind", Type::VARCHAR),
            ("unit_id", Type::VARCHAR),
            ("source_id", Type::VARCHAR),
            ("time_start", Type::VARCHAR),
            ("time_end", Type::VARCHAR),
            ("title", Type::VARCHAR),
            ("description", Type::VARCHAR),
            ("price", Type::INT8),
            ("note", Type::VARCHAR),
            ("capacity", Type::INT8),
            ("registered_count", Type::INT8),
            ("remaining_spots", Type::INT8),
            ("full", Type::BOOL),
        ],
        format,
    )
}

fn rules_schema(format: Option<&Format>) -> Vec<FieldInfo> {
    fields(
        &[
            ("id", Type::VARCHAR),
            ("title", Type::VARCHAR),
            ("description", Type::VARCHAR),
            ("day_of_week", Type::INT8),
            ("time_start", Type::VARCHAR),
            ("time_end", Type::VARCHAR),
            ("capacity", Type::INT8),
            ("reserved_spots", Type::INT8),
            ("price", Type::INT8),
            ("active", Type::BOOL),
            ("total_lessons", Type::INT8),
            ("starts_on", Type::VARCHAR),
        ],
        format,
    )
}

fn sessions_schema(format: Option<&Format>) -> Vec<FieldInfo> {
    fields(
        &[
            ("id", Type::VARCHAR),
            ("kind", Type::VARCHAR),
            ("title", Type::VARCHAR),
            ("description", Type::VARCHAR),
            ("date", Type::VARCHAR),
            ("time_start", Type::VARCHAR),
            ("time_end", Type::VARCHAR),
            ("capacity", Type::INT8),
            ("reserved_spots", Type::INT8),
            ("price", Type::INT8),
            ("active", Type::BOOL),
        ],
        format,
    )
}

fn instances_schema(format: Option<&Format>) -> Vec<FieldInfo> {
    fields(
        &[
            ("id", Type::VARCHAR),
            ("rule_id", Type::VARCHAR),
            ("date", Type::VARCHAR),
            ("cancelled", Type::BOOL),
            ("capacity_override", Type::INT8),
            ("note", Type::VARCHAR),
        ],
        format,
    )
}

fn registrations_schema(format: Option<&Format>) -> Vec<FieldInfo> {
    fields(
        &[
            ("id", Type::VARCHAR),
            ("kind", Type::VARCHAR),
            ("unit_id", Type::VARCHAR),
            ("name", Type::VARCHAR),
            ("email", Type::VARCHAR),
            ("phone", Type::VARCHAR),
            ("note", Type::VARCHAR),
            ("created_at", Type::VARCHAR),
        ],
        format,
    )
}

fn messages_schema(format: Option<&Format>) -> Vec<FieldInfo> {
    fields(
        &[
            ("id", Type::VARCHAR),
            ("name", Type::VARCHAR),
            ("email", Type::VARCHAR),
            ("body", Type::VARCHAR),
            ("read", Type::BOOL),
            ("received_at", Type::VARCHAR),
        ],
        format,
    )
}

/// Result columns of a statement, known from its table alone.
fn result_schema(sql: &str, format: Option<&Format>) -> Vec<FieldInfo> {
    match sql::select_table(sql).as_deref() {
        Some("schedule") => schedule_schema(format),
        Some("recurring_rules") => rules_schema(format),
        Some("one_time_sessions" | "workshops") => sessions_schema(format),
        Some("instances") => instances_schema(format),
        Some("registrations") => registrations_schema(format),
        Some("messages") => messages_schema(format),
        _ => vec![],
    }
}

#[async_trait]
impl SimpleQueryHandler for StudioHandler {
    async fn do_query<C>(
        &self,
        client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let principal = Self::principal(client);
        Ok(vec![self.run(principal, query, None).await?])
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct StudioQueryParser;

#[async_trait]
impl QueryParser for StudioQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt, column_format))
    }
}

#[async_trait]
impl ExtendedQueryHandler for StudioHandler {
    type Statement = String;
    type QueryParser = StudioQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let principal = Self::principal(client);
        let sql = substitute_params(portal);
        self.run(principal, &sql, Some(&portal.result_column_format))
            .await
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            result_schema(&target.statement, None),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(result_schema(
            &target.statement.statement,
            Some(&target.result_column_format),
        )))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start
                && let Ok(n) = sql[start..i].parse::<usize>()
            {
                max = max.max(n);
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    let params: Vec<Option<String>> = portal
        .parameters
        .iter()
        .map(|p| p.as_ref().map(|bytes| String::from_utf8_lossy(bytes).into_owned()))
        .collect();
    substitute(&portal.statement.statement, &params)
}

/// Highest index first so `$1` never clobbers the prefix of `$10`.
fn substitute(sql: &str, params: &[Option<String>]) -> String {
    let mut result = sql.to_string();
    for (i, param) in params.iter().enumerate().rev() {
        let placeholder = format!("${}", i + 1);
        let value = match param {
            Some(text) => format!("'{}'", text.replace('\'', "''")),
            None => "NULL".to_string(),
        };
        result = result.replace(&placeholder, &value);
    }
    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct StudioFactory {
    handler: Arc<StudioHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<StudioAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl StudioFactory {
    pub fn new(store: Arc<Store>, admin_password: String, public_password: String) -> Self {
        let auth_source = StudioAuthSource::new(admin_password, public_password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(StudioHandler::new(store)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for StudioFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client socket until it disconnects.
pub async fn process_connection(
    socket: TcpStream,
    factory: Arc<StudioFactory>,
    tls: Option<TlsAcceptor>,
) -> io::Result<()> {
    pgwire::tokio::process_socket(socket, tls, factory).await
}

// ── Errors ───────────────────────────────────────────────────────

fn user_error(code: &str, message: String) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        code.into(),
        message,
    )))
}

/// SQLSTATE for each schedule failure, so clients can tell "full" from
/// "cancelled" from "bad input".
fn sqlstate(e: &ScheduleError) -> &'static str {
    match e {
        ScheduleError::CapacityExceeded { .. } => "23514",
        ScheduleError::UnitUnavailable(_) => "55000",
        ScheduleError::Validation(_) => "22023",
        ScheduleError::NotFound(_) => "P0002",
        ScheduleError::PersistenceUnreachable(_) => "P0001",
    }
}

fn schedule_err(e: ScheduleError) -> PgWireError {
    if let ScheduleError::PersistenceUnreachable(inner) = &e {
        tracing::error!("persistence failure: {inner}");
    }
    user_error(sqlstate(&e), e.to_string())
}

fn store_err(e: StoreError) -> PgWireError {
    schedule_err(e.into())
}

fn sql_err(e: SqlError) -> PgWireError {
    let code = match &e {
        SqlError::BadValue { .. } | SqlError::MissingColumn(_) => "22023",
        SqlError::UnknownTable(_) => "42P01",
        SqlError::UnknownColumn(_) => "42703",
        _ => "42601",
    };
    user_error(code, e.to_string())
}

#[cfg(test)]
mod tests {
    use ulid::Ulid;

    use super::*;
    use crate::validate::ValidationErrors;

    #[test]
    fn count_params_takes_highest() {
        assert_eq!(count_params("SELECT * FROM messages"), 0);
        assert_eq!(
            count_params("SELECT * FROM schedule WHERE date >= $1 AND date <= $2"),
            2
        );
        assert_eq!(count_params("DELETE FROM messages WHERE id = $12"), 12);
    }

    #[test]
    fn substitute_quotes_and_nulls() {
        let sql = substitute(
            "INSERT INTO messages (name, email, body) VALUES ($1, $2, $3)",
            &[Some("O'Hara".into()), Some("o@example.com".into()), None],
        );
        assert_eq!(
            sql,
            "INSERT INTO messages (name, email, body) VALUES ('O''Hara', 'o@example.com', NULL)"
        );
    }

    #[test]
    fn substitute_double_digit_placeholders() {
        let params: Vec<Option<String>> = (1..=10).map(|n| Some(n.to_string())).collect();
        assert_eq!(substitute("$1 $10", &params), "'1' '10'");
    }

    #[test]
    fn distinct_sqlstates() {
        let target = RegistrationTarget::Workshop(Ulid::new());
        let codes = [
            sqlstate(&ScheduleError::CapacityExceeded {
                target,
                capacity: 3,
            }),
            sqlstate(&ScheduleError::UnitUnavailable(target)),
            sqlstate(&ScheduleError::Validation(ValidationErrors::single(
                "email",
                "is not a valid address",
            ))),
            sqlstate(&ScheduleError::NotFound(Ulid::new())),
            sqlstate(&ScheduleError::PersistenceUnreachable(StoreError::WalError(
                "disk".into(),
            ))),
        ];
        let mut unique = codes.to_vec();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn schema_follows_table() {
        let schema = result_schema("SELECT * FROM schedule WHERE date >= $1 AND date <= $2", None);
        assert_eq!(schema.len(), 14);
        assert_eq!(schema[0].name(), "date");
        assert!(result_schema("DELETE FROM messages WHERE id = $1", None).is_empty());
        assert_eq!(result_schema("SELECT * FROM workshops", None).len(), 11);
    }
}
