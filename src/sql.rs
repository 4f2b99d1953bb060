use chrono::{NaiveDate, NaiveTime};
use sqlparser::ast::{
    self, AssignmentTarget, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor,
    TableObject, Value, ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::*;
use crate::schedule::{CancelChange, InstancePatch, InstanceRef};

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    // ── Public ───────────────────────────────────────────
    SelectSchedule {
        start: NaiveDate,
        end: NaiveDate,
        kinds: KindFilter,
    },
    SelectRules,
    SelectSessions {
        kind: SessionKind,
    },
    InsertRegistration {
        id: Ulid,
        target: RegistrationTarget,
        participant: Participant,
    },
    InsertMessage {
        id: Ulid,
        name: String,
        email: String,
        body: String,
    },
    // ── Admin ────────────────────────────────────────────
    InsertRule {
        rule: RecurringRule,
    },
    UpdateRule {
        id: Ulid,
        set: Row,
    },
    DeleteRule {
        id: Ulid,
    },
    InsertSession {
        session: Session,
    },
    UpdateSession {
        kind: SessionKind,
        id: Ulid,
        set: Row,
    },
    DeleteSession {
        kind: SessionKind,
        id: Ulid,
    },
    UpdateInstance {
        at: InstanceRef,
        patch: InstancePatch,
    },
    SelectInstances {
        rule_id: Ulid,
    },
    SelectRegistrations {
        target: RegistrationTarget,
    },
    DeleteRegistration {
        id: Ulid,
    },
    SelectMessages,
    MarkMessageRead {
        id: Ulid,
    },
    DeleteMessage {
        id: Ulid,
    },
}

impl Command {
    /// Everything except reading the schedule and submitting forms.
    pub fn requires_admin(&self) -> bool {
        !matches!(
            self,
            Command::SelectSchedule { .. }
                | Command::SelectRules
                | Command::SelectSessions { .. }
                | Command::InsertRegistration { .. }
                | Command::InsertMessage { .. }
        )
    }
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => parse_update(&table.relation, assignments, selection),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

/// Table a SELECT reads from, if `sql` is one. Used to describe result
/// columns before parameters are bound.
pub fn select_table(sql: &str) -> Option<String> {
    let stmts = Parser::parse_sql(&PostgreSqlDialect {}, sql).ok()?;
    match stmts.first()? {
        Statement::Query(query) => match query.body.as_ref() {
            SetExpr::Select(select) => table_factor_name(&select.from.first()?.relation).ok(),
            _ => None,
        },
        _ => None,
    }
}

fn session_table(table: &str) -> Option<SessionKind> {
    match table {
        "one_time_sessions" => Some(SessionKind::OneTime),
        "workshops" => Some(SessionKind::Workshop),
        _ => None,
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let row = insert_row(insert, &table)?;
    let id = match row.get("id") {
        Some(lit) => lit.ulid("id")?,
        None => Ulid::new(),
    };
    let row = row.without("id");

    match table.as_str() {
        "recurring_rules" => {
            for col in ["title", "day_of_week", "time_start", "time_end", "capacity"] {
                row.require(col)?;
            }
            let mut rule = blank_rule(id);
            apply_rule(&mut rule, &row)?;
            Ok(Command::InsertRule { rule })
        }
        "registrations" => {
            row.only(&["kind", "unit_id", "name", "email", "phone", "note"])?;
            let kind = row
                .require("kind")?
                .text("kind")?
                .parse::<UnitKind>()
                .map_err(|e| SqlError::bad_value("kind", e))?;
            let unit_id = row.require("unit_id")?.ulid("unit_id")?;
            Ok(Command::InsertRegistration {
                id,
                target: RegistrationTarget::from_parts(kind, unit_id),
                participant: Participant {
                    name: row.text_or_empty("name")?,
                    email: row.text_or_empty("email")?,
                    phone: row.get("phone").and_then(Literal::opt_text),
                    note: row.get("note").and_then(Literal::opt_text),
                },
            })
        }
        "messages" => {
            row.only(&["name", "email", "body"])?;
            Ok(Command::InsertMessage {
                id,
                name: row.text_or_empty("name")?,
                email: row.text_or_empty("email")?,
                body: row.text_or_empty("body")?,
            })
        }
        other => match session_table(other) {
            Some(kind) => {
                for col in ["title", "date", "time_start", "time_end", "capacity"] {
                    row.require(col)?;
                }
                let mut session = blank_session(id, kind);
                apply_session(&mut session, &row)?;
                Ok(Command::InsertSession { session })
            }
            None => Err(SqlError::UnknownTable(table)),
        },
    }
}

fn parse_update(
    relation: &TableFactor,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(relation)?;
    match table.as_str() {
        "recurring_rules" => Ok(Command::UpdateRule {
            id: extract_where_id(selection)?,
            set: assignment_row(assignments)?,
        }),
        "instances" => Ok(Command::UpdateInstance {
            at: instance_ref(selection)?,
            patch: instance_patch(assignments)?,
        }),
        "messages" => {
            let set = assignment_row(assignments)?;
            set.only(&["read"])?;
            if !set.require("read")?.bool("read")? {
                return Err(SqlError::Unsupported("marking a message unread".into()));
            }
            Ok(Command::MarkMessageRead {
                id: extract_where_id(selection)?,
            })
        }
        other => match session_table(other) {
            Some(kind) => Ok(Command::UpdateSession {
                kind,
                id: extract_where_id(selection)?,
                set: assignment_row(assignments)?,
            }),
            None => Err(SqlError::UnknownTable(table)),
        },
    }
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?;

    match table.as_str() {
        "recurring_rules" => Ok(Command::DeleteRule { id }),
        "registrations" => Ok(Command::DeleteRegistration { id }),
        "messages" => Ok(Command::DeleteMessage { id }),
        other => match session_table(other) {
            Some(kind) => Ok(Command::DeleteSession { kind, id }),
            None => Err(SqlError::UnknownTable(table)),
        },
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    let mut filters = Vec::new();
    if let Some(selection) = &select.selection {
        collect_filters(selection, &mut filters)?;
    }
    let eq = |col: &'static str| {
        filters
            .iter()
            .find(|f| f.column == col && f.cmp == Cmp::Eq)
            .map(|f| &f.value)
    };

    match table.as_str() {
        "schedule" => {
            let (mut start, mut end) = (None, None);
            for f in filters.iter().filter(|f| f.column == "date") {
                let d = f.value.date("date")?;
                match f.cmp {
                    Cmp::Ge => start = Some(d),
                    Cmp::Le => end = Some(d),
                    Cmp::Eq => {
                        start = Some(d);
                        end = Some(d);
                    }
                    Cmp::In => return Err(SqlError::Unsupported("date IN (..)".into())),
                }
            }
            // each `kind = ..` or `kind IN (..)` narrows the set
            let mut kinds = KindFilter::all();
            for f in filters.iter().filter(|f| f.column == "kind") {
                let mut listed = KindFilter::none();
                for lit in f.values() {
                    let kind = lit
                        .text("kind")?
                        .parse::<UnitKind>()
                        .map_err(|e| SqlError::bad_value("kind", e))?;
                    listed = listed.with(kind);
                }
                kinds = kinds.intersect(listed);
            }
            Ok(Command::SelectSchedule {
                start: start.ok_or(SqlError::MissingFilter("date >="))?,
                end: end.ok_or(SqlError::MissingFilter("date <="))?,
                kinds,
            })
        }
        "recurring_rules" => Ok(Command::SelectRules),
        "instances" => Ok(Command::SelectInstances {
            rule_id: eq("rule_id")
                .ok_or(SqlError::MissingFilter("rule_id"))?
                .ulid("rule_id")?,
        }),
        "registrations" => {
            let kind = eq("kind")
                .ok_or(SqlError::MissingFilter("kind"))?
                .text("kind")?
                .parse::<UnitKind>()
                .map_err(|e| SqlError::bad_value("kind", e))?;
            let unit_id = eq("unit_id")
                .ok_or(SqlError::MissingFilter("unit_id"))?
                .ulid("unit_id")?;
            Ok(Command::SelectRegistrations {
                target: RegistrationTarget::from_parts(kind, unit_id),
            })
        }
        "messages" => Ok(Command::SelectMessages),
        other => match session_table(other) {
            Some(kind) => Ok(Command::SelectSessions { kind }),
            None => Err(SqlError::UnknownTable(table)),
        },
    }
}

// ── Filters ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cmp {
    Eq,
    Ge,
    Le,
    In,
}

#[derive(Debug)]
struct Filter {
    column: String,
    cmp: Cmp,
    value: Literal,
    /// Remaining members of an IN list.
    rest: Vec<Literal>,
}

impl Filter {
    fn new(column: String, cmp: Cmp, value: Literal) -> Self {
        Self {
            column,
            cmp,
            value,
            rest: Vec::new(),
        }
    }

    fn values(&self) -> impl Iterator<Item = &Literal> {
        std::iter::once(&self.value).chain(&self.rest)
    }
}

/// Flatten an AND-chain of `column <op> literal` comparisons.
fn collect_filters(expr: &Expr, out: &mut Vec<Filter>) -> Result<(), SqlError> {
    match expr {
        Expr::Nested(inner) => collect_filters(inner, out),
        Expr::BinaryOp { left, op, right } => {
            let cmp = match op {
                ast::BinaryOperator::And => {
                    collect_filters(left, out)?;
                    return collect_filters(right, out);
                }
                ast::BinaryOperator::Eq => Cmp::Eq,
                ast::BinaryOperator::GtEq => Cmp::Ge,
                ast::BinaryOperator::LtEq => Cmp::Le,
                other => return Err(SqlError::Unsupported(format!("operator {other}"))),
            };
            let column = expr_column_name(left)
                .ok_or_else(|| SqlError::Unsupported(format!("filter on {left}")))?;
            out.push(Filter::new(column, cmp, literal(right)?));
            Ok(())
        }
        Expr::Between {
            expr,
            negated: false,
            low,
            high,
        } => {
            let column = expr_column_name(expr)
                .ok_or_else(|| SqlError::Unsupported(format!("filter on {expr}")))?;
            out.push(Filter::new(column.clone(), Cmp::Ge, literal(low)?));
            out.push(Filter::new(column, Cmp::Le, literal(high)?));
            Ok(())
        }
        Expr::InList {
            expr,
            list,
            negated: false,
        } => {
            let column = expr_column_name(expr)
                .ok_or_else(|| SqlError::Unsupported(format!("filter on {expr}")))?;
            let mut values = list.iter().map(literal);
            let first = values
                .next()
                .ok_or_else(|| SqlError::Parse(format!("empty IN list for {column}")))??;
            let mut filter = Filter::new(column, Cmp::In, first);
            filter.rest = values.collect::<Result<_, _>>()?;
            out.push(filter);
            Ok(())
        }
        other => Err(SqlError::Unsupported(format!("filter {other}"))),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Ulid, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    let mut filters = Vec::new();
    collect_filters(sel, &mut filters)?;
    match filters.as_slice() {
        [f] if f.column == "id" && f.cmp == Cmp::Eq => f.value.ulid("id"),
        _ => Err(SqlError::MissingFilter("id")),
    }
}

/// `WHERE id = ..` or `WHERE rule_id = .. AND date = ..`.
fn instance_ref(selection: &Option<Expr>) -> Result<InstanceRef, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    let mut filters = Vec::new();
    collect_filters(sel, &mut filters)?;
    let eq = |col: &str| {
        filters
            .iter()
            .find(|f| f.column == col && f.cmp == Cmp::Eq)
            .map(|f| &f.value)
    };
    if let Some(id) = eq("id") {
        return Ok(InstanceRef::Id(id.ulid("id")?));
    }
    match (eq("rule_id"), eq("date")) {
        (Some(rule_id), Some(date)) => Ok(InstanceRef::Occurrence {
            rule_id: rule_id.ulid("rule_id")?,
            date: date.date("date")?,
        }),
        _ => Err(SqlError::MissingFilter("id, or rule_id and date")),
    }
}

fn instance_patch(assignments: &[ast::Assignment]) -> Result<InstancePatch, SqlError> {
    let mut patch = InstancePatch::default();
    for a in assignments {
        let column = assignment_column(a)?;
        match column.as_str() {
            "cancelled" => {
                let change = match &a.value {
                    Expr::UnaryOp {
                        op: ast::UnaryOperator::Not,
                        expr,
                    } if expr_column_name(expr).as_deref() == Some("cancelled") => {
                        CancelChange::Toggle
                    }
                    value => CancelChange::Set(literal(value)?.bool("cancelled")?),
                };
                patch.cancelled = Some(change);
            }
            "capacity_override" => {
                patch.capacity_override = Some(literal(&a.value)?.opt_int("capacity_override")?);
            }
            "note" => patch.note = Some(literal(&a.value)?.opt_text()),
            _ => return Err(SqlError::UnknownColumn(column)),
        }
    }
    if patch.is_empty() {
        return Err(SqlError::Parse("UPDATE without assignments".into()));
    }
    Ok(patch)
}

// ── Rows ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(String),
    Text(String),
}

impl Literal {
    fn text(&self, column: &str) -> Result<String, SqlError> {
        match self {
            Literal::Text(s) | Literal::Number(s) => Ok(s.clone()),
            Literal::Bool(b) => Ok(b.to_string()),
            Literal::Null => Err(SqlError::bad_value(column, "must not be NULL")),
        }
    }

    fn opt_text(&self) -> Option<String> {
        match self {
            Literal::Null => None,
            Literal::Text(s) | Literal::Number(s) => Some(s.clone()),
            Literal::Bool(b) => Some(b.to_string()),
        }
    }

    fn int<T: TryFrom<i64>>(&self, column: &str) -> Result<T, SqlError> {
        let n: i64 = match self {
            Literal::Number(s) | Literal::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| SqlError::bad_value(column, format!("not an integer: {s}")))?,
            _ => return Err(SqlError::bad_value(column, "expected an integer")),
        };
        T::try_from(n).map_err(|_| SqlError::bad_value(column, format!("{n} out of range")))
    }

    fn opt_int<T: TryFrom<i64>>(&self, column: &str) -> Result<Option<T>, SqlError> {
        match self {
            Literal::Null => Ok(None),
            _ => self.int(column).map(Some),
        }
    }

    fn bool(&self, column: &str) -> Result<bool, SqlError> {
        match self {
            Literal::Bool(b) => Ok(*b),
            Literal::Text(s) | Literal::Number(s) => match s.to_lowercase().as_str() {
                "true" | "t" | "1" => Ok(true),
                "false" | "f" | "0" => Ok(false),
                _ => Err(SqlError::bad_value(column, format!("not a boolean: {s}"))),
            },
            Literal::Null => Err(SqlError::bad_value(column, "must not be NULL")),
        }
    }

    fn ulid(&self, column: &str) -> Result<Ulid, SqlError> {
        let s = self.text(column)?;
        Ulid::from_string(&s).map_err(|e| SqlError::bad_value(column, format!("bad ULID: {e}")))
    }

    fn date(&self, column: &str) -> Result<NaiveDate, SqlError> {
        let s = self.text(column)?;
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|_| SqlError::bad_value(column, format!("expected YYYY-MM-DD, got {s}")))
    }

    fn opt_date(&self, column: &str) -> Result<Option<NaiveDate>, SqlError> {
        match self {
            Literal::Null => Ok(None),
            _ => self.date(column).map(Some),
        }
    }

    fn time(&self, column: &str) -> Result<NaiveTime, SqlError> {
        let s = self.text(column)?;
        NaiveTime::parse_from_str(s.trim(), "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s.trim(), "%H:%M"))
            .map_err(|_| SqlError::bad_value(column, format!("expected HH:MM, got {s}")))
    }
}

/// Column/value pairs from an INSERT row or an UPDATE SET list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row(pub Vec<(String, Literal)>);

impl Row {
    pub fn get(&self, column: &str) -> Option<&Literal> {
        self.0.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    fn require(&self, column: &'static str) -> Result<&Literal, SqlError> {
        self.get(column).ok_or(SqlError::MissingColumn(column))
    }

    fn without(mut self, column: &str) -> Self {
        self.0.retain(|(c, _)| c != column);
        self
    }

    fn only(&self, allowed: &[&str]) -> Result<(), SqlError> {
        match self.0.iter().find(|(c, _)| !allowed.contains(&c.as_str())) {
            Some((c, _)) => Err(SqlError::UnknownColumn(c.clone())),
            None => Ok(()),
        }
    }

    /// A missing or NULL column reads as empty so field validation can name it.
    fn text_or_empty(&self, column: &str) -> Result<String, SqlError> {
        Ok(self.get(column).and_then(Literal::opt_text).unwrap_or_default())
    }
}

fn blank_rule(id: Ulid) -> RecurringRule {
    RecurringRule {
        id,
        title: String::new(),
        description: None,
        day_of_week: 0,
        time_start: NaiveTime::MIN,
        time_end: NaiveTime::MIN,
        capacity: 0,
        reserved_spots: 0,
        price: 0,
        active: true,
        total_lessons: None,
        starts_on: None,
    }
}

fn blank_session(id: Ulid, kind: SessionKind) -> Session {
    Session {
        id,
        kind,
        title: String::new(),
        description: None,
        date: NaiveDate::MIN,
        time_start: NaiveTime::MIN,
        time_end: NaiveTime::MIN,
        capacity: 0,
        reserved_spots: 0,
        price: 0,
        active: true,
    }
}

/// Overwrite the columns present in `row`.
pub fn apply_rule(rule: &mut RecurringRule, row: &Row) -> Result<(), SqlError> {
    for (column, value) in &row.0 {
        let c = column.as_str();
        match c {
            "title" => rule.title = value.text(c)?,
            "description" => rule.description = value.opt_text(),
            "day_of_week" => rule.day_of_week = value.int(c)?,
            "time_start" => rule.time_start = value.time(c)?,
            "time_end" => rule.time_end = value.time(c)?,
            "capacity" => rule.capacity = value.int(c)?,
            "reserved_spots" => rule.reserved_spots = value.int(c)?,
            "price" => rule.price = value.int(c)?,
            "active" => rule.active = value.bool(c)?,
            "total_lessons" => rule.total_lessons = value.opt_int(c)?,
            "starts_on" => rule.starts_on = value.opt_date(c)?,
            _ => return Err(SqlError::UnknownColumn(column.clone())),
        }
    }
    Ok(())
}

/// Overwrite the columns present in `row`.
pub fn apply_session(session: &mut Session, row: &Row) -> Result<(), SqlError> {
    for (column, value) in &row.0 {
        let c = column.as_str();
        match c {
            "title" => session.title = value.text(c)?,
            "description" => session.description = value.opt_text(),
            "date" => session.date = value.date(c)?,
            "time_start" => session.time_start = value.time(c)?,
            "time_end" => session.time_end = value.time(c)?,
            "capacity" => session.capacity = value.int(c)?,
            "reserved_spots" => session.reserved_spots = value.int(c)?,
            "price" => session.price = value.int(c)?,
            "active" => session.active = value.bool(c)?,
            _ => return Err(SqlError::UnknownColumn(column.clone())),
        }
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

/// The single VALUES row of an INSERT, keyed by its column list.
fn insert_row(insert: &ast::Insert, table: &str) -> Result<Row, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    let rows = match body.body.as_ref() {
        SetExpr::Values(values) => &values.rows,
        _ => return Err(SqlError::Parse("expected VALUES".into())),
    };
    let values = match rows.as_slice() {
        [] => return Err(SqlError::Parse("empty VALUES".into())),
        [values] => values,
        _ => return Err(SqlError::Unsupported("multi-row INSERT".into())),
    };
    if insert.columns.is_empty() {
        return Err(SqlError::Parse(format!("INSERT INTO {table} needs a column list")));
    }
    if insert.columns.len() != values.len() {
        return Err(SqlError::WrongArity(
            table.to_string(),
            insert.columns.len(),
            values.len(),
        ));
    }
    let mut row = Row::default();
    for (column, value) in insert.columns.iter().zip(values) {
        row.0.push((column.value.to_lowercase(), literal(value)?));
    }
    Ok(row)
}

fn assignment_column(a: &ast::Assignment) -> Result<String, SqlError> {
    match &a.target {
        AssignmentTarget::ColumnName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty column name".into()))
        }
        AssignmentTarget::Tuple(_) => Err(SqlError::Unsupported("tuple assignment".into())),
    }
}

fn assignment_row(assignments: &[ast::Assignment]) -> Result<Row, SqlError> {
    if assignments.is_empty() {
        return Err(SqlError::Parse("UPDATE without assignments".into()));
    }
    let mut row = Row::default();
    for a in assignments {
        let column = assignment_column(a)?;
        if column == "id" {
            return Err(SqlError::Unsupported("changing id".into()));
        }
        row.0.push((column, literal(&a.value)?));
    }
    Ok(row)
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn literal(expr: &Expr) -> Result<Literal, SqlError> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => match value {
            Value::Null => Ok(Literal::Null),
            Value::Boolean(b) => Ok(Literal::Bool(*b)),
            Value::Number(n, _) => Ok(Literal::Number(n.clone())),
            Value::SingleQuotedString(s) => Ok(Literal::Text(s.clone())),
            other => Err(SqlError::Parse(format!("unsupported value: {other}"))),
        },
        Expr::UnaryOp {
            op: ast::UnaryOperator::Minus,
            expr,
        } => match literal(expr)? {
            Literal::Number(n) => Ok(Literal::Number(format!("-{n}"))),
            _ => Err(SqlError::Parse(format!("cannot negate {expr}"))),
        },
        Expr::Nested(inner) => literal(inner),
        _ => Err(SqlError::Parse(format!("expected a literal, got {expr}"))),
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SqlError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("empty query")]
    Empty,
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("{0}: expected {1} values, got {2}")]
    WrongArity(String, usize, usize),
    #[error("missing column: {0}")]
    MissingColumn(&'static str),
    #[error("missing filter: {0}")]
    MissingFilter(&'static str),
    #[error("{column}: {message}")]
    BadValue { column: String, message: String },
}

impl SqlError {
    fn bad_value(column: &str, message: impl ToString) -> Self {
        SqlError::BadValue {
            column: column.to_string(),
            message: message.to_string(),
        }
    }
}
