use sqlparser::ast::{self, Expr, FromTable, ObjectNamePart, SelectItem, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::*;

/// Minimum free-slot length when the query names none.
pub const DEFAULT_MIN_DURATION_US: Micros = 30 * MICROS_PER_MINUTE;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertRoom {
        id: Option<String>,
        name: String,
        capacity: Option<u32>,
        description: Option<String>,
    },
    DeleteRoom {
        id: String,
    },
    SelectRooms {
        id: Option<String>,
    },
    InsertBooking {
        room_id: String,
        start: Micros,
        end: Micros,
    },
    DeleteBooking {
        room_id: String,
        id: Ulid,
    },
    SelectBookings {
        room_id: Option<String>,
    },
    SelectFreeSlots {
        room_id: String,
        start: Micros,
        end: Micros,
        min_duration: Micros,
    },
}

/// `col <op> value` conjuncts of a WHERE clause.
type Filters = Vec<(String, ast::BinaryOperator, Expr)>;

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }
    if stmts.len() > 1 {
        return Err(SqlError::Unsupported("multiple statements".into()));
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

/// Table whose rows a statement returns: the target of an INSERT or the FROM of a SELECT.
///
/// `None` for DELETE and anything that does not parse. `$n` placeholders are accepted.
pub fn result_table(sql: &str) -> Option<String> {
    let stmts = Parser::parse_sql(&PostgreSqlDialect {}, sql).ok()?;
    match stmts.as_slice() {
        [Statement::Insert(insert)] => insert_table_name(insert).ok(),
        [Statement::Query(query)] => match query.body.as_ref() {
            SetExpr::Select(select) => select
                .from
                .first()
                .and_then(|from| table_factor_name(&from.relation).ok()),
            _ => None,
        },
        _ => None,
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let row = extract_insert_row(insert)?;

    match table.as_str() {
        "rooms" => {
            let columns = column_names(insert, &["name", "capacity", "description", "id"], row.len());
            check_arity(&columns, &row)?;
            let mut cmd_id = None;
            let mut name = None;
            let mut capacity = None;
            let mut description = None;
            for (col, value) in columns.iter().zip(&row) {
                match col.as_str() {
                    "id" => cmd_id = parse_string_or_null(value)?,
                    "name" => name = parse_string_or_null(value)?,
                    "capacity" => capacity = parse_u32_or_null(value)?,
                    "description" => description = parse_string_or_null(value)?,
                    other => return Err(SqlError::UnknownColumn("rooms", other.to_string())),
                }
            }
            Ok(Command::InsertRoom {
                id: cmd_id,
                name: name.ok_or(SqlError::MissingColumn("rooms", "name"))?,
                capacity,
                description,
            })
        }
        "bookings" => {
            let columns = column_names(insert, &["room_id", "start", "end"], row.len());
            check_arity(&columns, &row)?;
            let (mut room_id, mut start, mut end) = (None, None, None);
            for (col, value) in columns.iter().zip(&row) {
                match col.as_str() {
                    "room_id" => room_id = Some(parse_string(value)?),
                    "start" => start = Some(parse_timestamp_expr(value)?),
                    "end" => end = Some(parse_timestamp_expr(value)?),
                    other => return Err(SqlError::UnknownColumn("bookings", other.to_string())),
                }
            }
            Ok(Command::InsertBooking {
                room_id: room_id.ok_or(SqlError::MissingColumn("bookings", "room_id"))?,
                start: start.ok_or(SqlError::MissingColumn("bookings", "start"))?,
                end: end.ok_or(SqlError::MissingColumn("bookings", "end"))?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let filters = collect_filters(delete.selection.as_ref())?;

    match table.as_str() {
        "rooms" => Ok(Command::DeleteRoom {
            id: required_eq(&filters, "id", parse_string)?,
        }),
        "bookings" => Ok(Command::DeleteBooking {
            room_id: required_eq(&filters, "room_id", parse_string)?,
            id: required_eq(&filters, "id", parse_ulid)?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };
    if !select
        .projection
        .iter()
        .all(|item| matches!(item, SelectItem::Wildcard(_)))
    {
        return Err(SqlError::Unsupported("only SELECT * is supported".into()));
    }

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;
    let filters = collect_filters(select.selection.as_ref())?;

    match table.as_str() {
        "rooms" => Ok(Command::SelectRooms {
            id: optional_eq(&filters, "id", parse_string)?,
        }),
        "bookings" => Ok(Command::SelectBookings {
            room_id: optional_eq(&filters, "room_id", parse_string)?,
        }),
        "free_slots" => {
            let min_duration = match optional_eq(&filters, "duration_min", parse_i64_expr)? {
                Some(minutes) => minutes
                    .checked_mul(MICROS_PER_MINUTE)
                    .ok_or_else(|| SqlError::Parse(format!("duration_min {minutes} out of range")))?,
                None => optional_eq(&filters, "min_duration", parse_i64_expr)?
                    .unwrap_or(DEFAULT_MIN_DURATION_US),
            };
            Ok(Command::SelectFreeSlots {
                room_id: required_eq(&filters, "room_id", parse_string)?,
                start: required_bound(&filters, "start", ast::BinaryOperator::GtEq)?,
                end: required_bound(&filters, "end", ast::BinaryOperator::LtEq)?,
                min_duration,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── WHERE clause handling ─────────────────────────────────────

fn collect_filters(selection: Option<&Expr>) -> Result<Filters, SqlError> {
    let mut filters = Vec::new();
    if let Some(expr) = selection {
        flatten_conjuncts(expr, &mut filters)?;
    }
    Ok(filters)
}

fn flatten_conjuncts(expr: &Expr, out: &mut Filters) -> Result<(), SqlError> {
    match expr {
        Expr::Nested(inner) => flatten_conjuncts(inner, out),
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::And,
            right,
        } => {
            flatten_conjuncts(left, out)?;
            flatten_conjuncts(right, out)
        }
        Expr::BinaryOp { left, op, right } => {
            let col = expr_column_name(left)
                .ok_or_else(|| SqlError::Unsupported(format!("filter on {left}")))?;
            out.push((col, op.clone(), (**right).clone()));
            Ok(())
        }
        other => Err(SqlError::Unsupported(format!("filter {other}"))),
    }
}

fn find_filter<'a>(filters: &'a Filters, col: &str, op: &ast::BinaryOperator) -> Option<&'a Expr> {
    filters
        .iter()
        .find(|(c, o, _)| c == col && o == op)
        .map(|(_, _, e)| e)
}

fn optional_eq<T>(
    filters: &Filters,
    col: &'static str,
    parse: fn(&Expr) -> Result<T, SqlError>,
) -> Result<Option<T>, SqlError> {
    find_filter(filters, col, &ast::BinaryOperator::Eq)
        .map(parse)
        .transpose()
}

fn required_eq<T>(
    filters: &Filters,
    col: &'static str,
    parse: fn(&Expr) -> Result<T, SqlError>,
) -> Result<T, SqlError> {
    optional_eq(filters, col, parse)?.ok_or(SqlError::MissingFilter(col))
}

/// `col >= v` / `col <= v` bound, also accepting `col = v`.
fn required_bound(filters: &Filters, col: &'static str, op: ast::BinaryOperator) -> Result<Micros, SqlError> {
    find_filter(filters, col, &op)
        .or_else(|| find_filter(filters, col, &ast::BinaryOperator::Eq))
        .ok_or(SqlError::MissingFilter(col))
        .and_then(parse_timestamp_expr)
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

/// Explicit column list, or a prefix of the table's positional default as long as the row.
fn column_names(insert: &ast::Insert, positional: &[&str], row_len: usize) -> Vec<String> {
    if insert.columns.is_empty() {
        positional.iter().take(row_len).map(|c| c.to_string()).collect()
    } else {
        insert.columns.iter().map(|c| c.value.to_lowercase()).collect()
    }
}

fn check_arity(columns: &[String], row: &[Expr]) -> Result<(), SqlError> {
    if columns.len() != row.len() {
        return Err(SqlError::Parse(format!(
            "{} values for {} columns",
            row.len(),
            columns.len()
        )));
    }
    Ok(())
}

fn extract_insert_row(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.len() {
            0 => Err(SqlError::Parse("empty VALUES".into())),
            1 => Ok(values.rows[0].clone()),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => Ok(s.clone()),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

fn parse_string_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        _ => parse_string(expr).map(Some),
    }
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    let s = parse_string(expr)?;
    Ulid::from_string(&s).map_err(|e| SqlError::Parse(format!("bad booking id: {e}")))
}

fn parse_i64_expr(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad integer {s}: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64_expr(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr}")))
    }
}

fn parse_u32_or_null(expr: &Expr) -> Result<Option<u32>, SqlError> {
    if let Some(Value::Null) = extract_value(expr) {
        return Ok(None);
    }
    let v = parse_i64_expr(expr)?;
    u32::try_from(v)
        .map(Some)
        .map_err(|_| SqlError::Parse(format!("{v} out of u32 range")))
}

/// Unix microseconds as a number, or a quoted ISO-8601 timestamp.
fn parse_timestamp_expr(expr: &Expr) -> Result<Micros, SqlError> {
    if let Some(Value::SingleQuotedString(s)) = extract_value(expr)
        && s.parse::<i64>().is_err()
    {
        return parse_timestamp(s).ok_or_else(|| SqlError::Parse(format!("bad timestamp: {s}")));
    }
    parse_i64_expr(expr)
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(&'static str, String),
    MissingColumn(&'static str, &'static str),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(t, c) => write!(f, "{t}: unknown column {c}"),
            SqlError::MissingColumn(t, c) => write!(f, "{t}: missing value for {c}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOKING: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";

    #[test]
    fn parse_insert_room_named_columns() {
        let sql = "INSERT INTO rooms (name, capacity, description) VALUES ('Lab', 4, 'Quiet room')";
        let cmd = parse_sql(sql).unwrap();
        assert_eq!(
            cmd,
            Command::InsertRoom {
                id: None,
                name: "Lab".into(),
                capacity: Some(4),
                description: Some("Quiet room".into()),
            }
        );
    }

    #[test]
    fn parse_insert_room_with_explicit_id_and_nulls() {
        let sql = "INSERT INTO rooms (id, name, capacity, description) VALUES ('lab-1', 'Lab', NULL, NULL)";
        match parse_sql(sql).unwrap() {
            Command::InsertRoom { id, capacity, description, .. } => {
                assert_eq!(id.as_deref(), Some("lab-1"));
                assert_eq!(capacity, None);
                assert_eq!(description, None);
            }
            cmd => panic!("expected InsertRoom, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_room_positional() {
        let sql = "INSERT INTO rooms VALUES ('Lab')";
        match parse_sql(sql).unwrap() {
            Command::InsertRoom { name, capacity, .. } => {
                assert_eq!(name, "Lab");
                assert_eq!(capacity, None);
            }
            cmd => panic!("expected InsertRoom, got {cmd:?}"),
        }
    }

    #[test]
    fn result_table_reads_the_statement_not_its_literals() {
        assert_eq!(
            result_table("SELECT * FROM rooms WHERE id = 'bookings-annex'").as_deref(),
            Some("rooms")
        );
        assert_eq!(
            result_table(r#"INSERT INTO bookings (room_id, start, "end") VALUES ($1, $2, $3)"#).as_deref(),
            Some("bookings")
        );
        assert_eq!(
            result_table("SELECT * FROM free_slots WHERE room_id = $1 AND start >= $2 AND \"end\" <= $3").as_deref(),
            Some("free_slots")
        );
        assert_eq!(result_table("DELETE FROM bookings WHERE room_id = 'rooms'"), None);
        assert_eq!(result_table("not sql at all"), None);
    }

    #[test]
    fn parse_insert_rejects_value_count_mismatch() {
        let extra = "INSERT INTO rooms VALUES ('Lab', 4, 'd', 'x', 'extra')";
        assert!(matches!(parse_sql(extra), Err(SqlError::Parse(_))));

        let short = "INSERT INTO rooms (name, capacity) VALUES ('Lab')";
        assert!(matches!(parse_sql(short), Err(SqlError::Parse(_))));

        let long = r#"INSERT INTO bookings (room_id, start, "end") VALUES ('r', 1, 2, 3)"#;
        assert!(matches!(parse_sql(long), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_insert_room_without_name_errors() {
        let sql = "INSERT INTO rooms (capacity) VALUES (4)";
        assert!(matches!(parse_sql(sql), Err(SqlError::MissingColumn("rooms", "name"))));
    }

    #[test]
    fn parse_insert_room_unknown_column_errors() {
        let sql = "INSERT INTO rooms (name, colour) VALUES ('Lab', 'red')";
        assert!(matches!(parse_sql(sql), Err(SqlError::UnknownColumn("rooms", _))));
    }

    #[test]
    fn parse_delete_room() {
        let cmd = parse_sql("DELETE FROM rooms WHERE id = 'boardroom-3'").unwrap();
        assert_eq!(cmd, Command::DeleteRoom { id: "boardroom-3".into() });
    }

    #[test]
    fn parse_select_rooms() {
        assert_eq!(parse_sql("SELECT * FROM rooms").unwrap(), Command::SelectRooms { id: None });
        assert_eq!(
            parse_sql("SELECT * FROM rooms WHERE id = 'a'").unwrap(),
            Command::SelectRooms { id: Some("a".into()) }
        );
    }

    #[test]
    fn parse_insert_booking_iso() {
        let sql = r#"INSERT INTO bookings (room_id, start, "end") VALUES ('meeting-room-2', '2030-01-01T10:00:00Z', '2030-01-01T11:00:00.5Z')"#;
        match parse_sql(sql).unwrap() {
            Command::InsertBooking { room_id, start, end } => {
                assert_eq!(room_id, "meeting-room-2");
                assert_eq!(start, parse_timestamp("2030-01-01T10:00:00Z").unwrap());
                assert_eq!(end - start, 3_600_500_000);
            }
            cmd => panic!("expected InsertBooking, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_booking_micros() {
        let sql = r#"INSERT INTO bookings (room_id, start, "end") VALUES ('r', 1000, '2000')"#;
        assert_eq!(
            parse_sql(sql).unwrap(),
            Command::InsertBooking { room_id: "r".into(), start: 1000, end: 2000 }
        );
    }

    #[test]
    fn parse_insert_booking_bad_timestamp() {
        let sql = r#"INSERT INTO bookings (room_id, start, "end") VALUES ('r', 'soon', 'later')"#;
        assert!(matches!(parse_sql(sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_multi_row_insert_rejected() {
        let sql = r#"INSERT INTO bookings (room_id, start, "end") VALUES ('r', 1, 2), ('r', 3, 4)"#;
        assert!(matches!(parse_sql(sql), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn parse_delete_booking() {
        let sql = format!("DELETE FROM bookings WHERE room_id = 'r' AND id = '{BOOKING}'");
        match parse_sql(&sql).unwrap() {
            Command::DeleteBooking { room_id, id } => {
                assert_eq!(room_id, "r");
                assert_eq!(id.to_string(), BOOKING);
            }
            cmd => panic!("expected DeleteBooking, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_delete_booking_requires_room() {
        let sql = format!("DELETE FROM bookings WHERE id = '{BOOKING}'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::MissingFilter("room_id"))));
    }

    #[test]
    fn parse_select_bookings() {
        assert_eq!(
            parse_sql("SELECT * FROM bookings").unwrap(),
            Command::SelectBookings { room_id: None }
        );
        assert_eq!(
            parse_sql("SELECT * FROM bookings WHERE room_id = 'r'").unwrap(),
            Command::SelectBookings { room_id: Some("r".into()) }
        );
    }

    #[test]
    fn parse_select_free_slots_defaults_to_thirty_minutes() {
        let sql = r#"SELECT * FROM free_slots WHERE room_id = 'r' AND start >= 1000 AND "end" <= 2000"#;
        assert_eq!(
            parse_sql(sql).unwrap(),
            Command::SelectFreeSlots {
                room_id: "r".into(),
                start: 1000,
                end: 2000,
                min_duration: DEFAULT_MIN_DURATION_US,
            }
        );
    }

    #[test]
    fn parse_select_free_slots_duration_min() {
        let sql = r#"SELECT * FROM free_slots WHERE room_id = 'r' AND start >= '2030-01-01T08:00:00Z' AND "end" <= '2030-01-01T18:00:00Z' AND duration_min = 60"#;
        match parse_sql(sql).unwrap() {
            Command::SelectFreeSlots { start, end, min_duration, .. } => {
                assert_eq!(end - start, 10 * 60 * MICROS_PER_MINUTE);
                assert_eq!(min_duration, 60 * MICROS_PER_MINUTE);
            }
            cmd => panic!("expected SelectFreeSlots, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_select_free_slots_min_duration_micros() {
        let sql = r#"SELECT * FROM free_slots WHERE (room_id = 'r' AND start = 0) AND "end" = 10 AND min_duration = 5"#;
        match parse_sql(sql).unwrap() {
            Command::SelectFreeSlots { start, end, min_duration, .. } => {
                assert_eq!((start, end, min_duration), (0, 10, 5));
            }
            cmd => panic!("expected SelectFreeSlots, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_select_free_slots_missing_window() {
        let sql = "SELECT * FROM free_slots WHERE room_id = 'r'";
        assert!(matches!(parse_sql(sql), Err(SqlError::MissingFilter("start"))));
    }

    #[test]
    fn parse_projection_rejected() {
        assert!(matches!(
            parse_sql("SELECT id FROM rooms"),
            Err(SqlError::Unsupported(_))
        ));
    }

    #[test]
    fn parse_unknown_table_errors() {
        assert!(matches!(
            parse_sql("SELECT * FROM holds"),
            Err(SqlError::UnknownTable(_))
        ));
    }

    #[test]
    fn parse_empty_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
    }

    #[test]
    fn parse_multiple_statements_rejected() {
        assert!(matches!(
            parse_sql("SELECT * FROM rooms; SELECT * FROM bookings"),
            Err(SqlError::Unsupported(_))
        ));
    }
}
