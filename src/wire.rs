use std::fmt::Debug;
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::StartupHandler;
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;

use crate::engine::{Engine, EngineError, ErrorClass};
use crate::model::*;
use crate::observability;
use crate::sql::{self, Command};

pub struct RoomLedgerHandler {
    engine: Arc<Engine>,
    query_parser: Arc<RoomLedgerQueryParser>,
}

impl RoomLedgerHandler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            query_parser: Arc::new(RoomLedgerQueryParser),
        }
    }

    /// Parse, execute and record metrics for one statement.
    async fn run(&self, query: &str, format: Option<&Format>) -> PgWireResult<Response> {
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        let label = observability::command_label(&cmd);
        let started = Instant::now();

        let result = self.execute_command(cmd, format).await;

        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        if let Err(ref e) = result {
            tracing::debug!("{label} failed: {e}");
        }

        result.map_err(engine_err)
    }

    async fn execute_command(
        &self,
        cmd: Command,
        format: Option<&Format>,
    ) -> Result<Response, EngineError> {
        let engine = &self.engine;
        match cmd {
            Command::InsertRoom {
                id,
                name,
                capacity,
                description,
            } => {
                let room = engine.create_room(id, name, capacity, description)?;
                Ok(room_rows(vec![room], format))
            }
            Command::DeleteRoom { id } => {
                engine.delete_room(&id).await?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::SelectRooms { id: Some(id) } => Ok(room_rows(vec![engine.get_room(&id)?], format)),
            Command::SelectRooms { id: None } => Ok(room_rows(engine.list_rooms(), format)),
            Command::InsertBooking {
                room_id,
                start,
                end,
            } => {
                let interval = engine.reserve(&room_id, start, end).await?;
                Ok(booking_rows(vec![BookingInfo::new(&room_id, &interval)], format))
            }
            Command::DeleteBooking { room_id, id } => {
                engine.cancel(&room_id, id).await?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::SelectBookings { room_id: Some(room_id) } => {
                let bookings = engine
                    .list_for(&room_id)
                    .await?
                    .iter()
                    .map(|i| BookingInfo::new(&room_id, i))
                    .collect();
                Ok(booking_rows(bookings, format))
            }
            Command::SelectBookings { room_id: None } => Ok(booking_rows(engine.list_all().await, format)),
            Command::SelectFreeSlots {
                room_id,
                start,
                end,
                min_duration,
            } => {
                let slots = engine.free_slots(&room_id, start, end, min_duration).await?;
                Ok(free_slot_rows(&room_id, slots, format))
            }
        }
    }
}

// ── Result sets ──────────────────────────────────────────────────

/// Build field descriptors, honoring the client's requested result formats.
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

fn rooms_schema(format: Option<&Format>) -> Vec<FieldInfo> {
    fields(
        &[
            ("id", Type::VARCHAR),
            ("name", Type::VARCHAR),
            ("capacity", Type::INT8),
            ("description", Type::VARCHAR),
        ],
        format,
    )
}

fn bookings_schema(format: Option<&Format>) -> Vec<FieldInfo> {
    fields(
        &[
            ("id", Type::VARCHAR),
            ("room_id", Type::VARCHAR),
            ("start", Type::VARCHAR),
            ("end", Type::VARCHAR),
        ],
        format,
    )
}

fn free_slots_schema(format: Option<&Format>) -> Vec<FieldInfo> {
    fields(
        &[
            ("room_id", Type::VARCHAR),
            ("start", Type::VARCHAR),
            ("end", Type::VARCHAR),
        ],
        format,
    )
}

fn room_rows(rooms: Vec<RoomInfo>, format: Option<&Format>) -> Response {
    let schema = Arc::new(rooms_schema(format));
    let rows: Vec<PgWireResult<_>> = rooms
        .into_iter()
        .map(|room| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&room.id)?;
            encoder.encode_field(&room.name)?;
            encoder.encode_field(&room.capacity.map(i64::from))?;
            encoder.encode_field(&room.description)?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn booking_rows(bookings: Vec<BookingInfo>, format: Option<&Format>) -> Response {
    let schema = Arc::new(bookings_schema(format));
    let rows: Vec<PgWireResult<_>> = bookings
        .into_iter()
        .map(|b| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&b.id.to_string())?;
            encoder.encode_field(&b.room_id)?;
            encoder.encode_field(&format_timestamp(b.start))?;
            encoder.encode_field(&format_timestamp(b.end))?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn free_slot_rows(room_id: &str, slots: Vec<Span>, format: Option<&Format>) -> Response {
    let schema = Arc::new(free_slots_schema(format));
    let room_id = room_id.to_string();
    let rows: Vec<PgWireResult<_>> = slots
        .into_iter()
        .map(|slot| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&room_id)?;
            encoder.encode_field(&format_timestamp(slot.start))?;
            encoder.encode_field(&format_timestamp(slot.end))?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

/// Row shape a statement will produce, for Describe messages.
fn result_schema(sql: &str, format: Option<&Format>) -> Vec<FieldInfo> {
    match sql::result_table(sql).as_deref() {
        Some("rooms") => rooms_schema(format),
        Some("bookings") => bookings_schema(format),
        Some("free_slots") => free_slots_schema(format),
        _ => vec![],
    }
}

#[async_trait]
impl SimpleQueryHandler for RoomLedgerHandler {
    async fn do_query<C>(
        &self,
        _client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(vec![self.run(query, None).await?])
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct RoomLedgerQueryParser;

#[async_trait]
impl QueryParser for RoomLedgerQueryParser {
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
impl ExtendedQueryHandler for RoomLedgerHandler {
    type Statement = String;
    type QueryParser = RoomLedgerQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        _client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let sql = substitute_params(portal);
        self.run(&sql, Some(&portal.result_column_format)).await
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

/// `$N` placeholders outside single-quoted literals, as (byte range, N).
fn placeholders(sql: &str) -> Vec<(Range<usize>, usize)> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut in_literal = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            // An escaped '' toggles twice and stays inside the literal.
            b'\'' => {
                in_literal = !in_literal;
                i += 1;
            }
            b'$' if !in_literal => {
                let start = i;
                i += 1;
                let digits = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if i > digits
                    && let Ok(n) = sql[digits..i].parse::<usize>()
                {
                    found.push((start..i, n));
                }
            }
            _ => i += 1,
        }
    }
    found
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    placeholders(sql).into_iter().map(|(_, n)| n).max().unwrap_or(0)
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    let params: Vec<Option<String>> = portal
        .parameters
        .iter()
        .map(|p| p.as_ref().map(|bytes| String::from_utf8_lossy(bytes).into_owned()))
        .collect();
    substitute_text_params(&portal.statement.statement, &params)
}

/// Single pass over the original SQL. Bound values are never rescanned, and
/// placeholders without a bound value are left as written.
fn substitute_text_params(sql: &str, params: &[Option<String>]) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut copied = 0;
    for (range, n) in placeholders(sql) {
        let Some(param) = n.checked_sub(1).and_then(|idx| params.get(idx)) else {
            continue;
        };
        result.push_str(&sql[copied..range.start]);
        match param {
            Some(text) => {
                result.push('\'');
                result.push_str(&text.replace('\'', "''"));
                result.push('\'');
            }
            None => result.push_str("NULL"),
        }
        copied = range.end;
    }
    result.push_str(&sql[copied..]);
    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct RoomLedgerFactory {
    handler: Arc<RoomLedgerHandler>,
    noop: Arc<NoopHandler>,
}

impl RoomLedgerFactory {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            handler: Arc::new(RoomLedgerHandler::new(engine)),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for RoomLedgerFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.noop.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    engine: Arc<Engine>,
    tls: Option<TlsAcceptor>,
) -> std::io::Result<()> {
    let factory = Arc::new(RoomLedgerFactory::new(engine));
    pgwire::tokio::process_socket(socket, tls, factory).await
}

// ── Error mapping ────────────────────────────────────────────────

/// SQLSTATE for an engine failure: a specific code where PostgreSQL has one,
/// otherwise the code for the error's class.
fn sqlstate(e: &EngineError) -> &'static str {
    match e {
        EngineError::AlreadyExists(_) => "23505",
        EngineError::RoomNotEmpty(_) => "2BP01",
        EngineError::LimitExceeded(_) => "54000",
        _ => match e.class() {
            ErrorClass::ClientError => "22023",
            ErrorClass::NotFound => "P0002",
            ErrorClass::Conflict => "23P01",
        },
    }
}

fn engine_err(e: EngineError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        sqlstate(&e).into(),
        e.to_string(),
    )))
}

fn sql_err(e: crate::sql::SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}
