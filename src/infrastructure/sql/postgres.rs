//! PostgreSQL driver over a single sqlx connection per session

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::{PgArguments, PgConnection, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Connection as _, Decode, Either, Executor as _, Postgres, Row as _, Type, TypeInfo};
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::domain::DomainError;
use crate::domain::sql::{
    Connection, ConnectionExt, Driver, ExecResult, IsolationLevel, Negotiated, QueryContext, Row,
    SqlValue, Statement, StatementExt, Transaction, TxOptions,
};

type SharedConnection = Arc<Mutex<Option<PgConnection>>>;

/// Driver opening plain PostgreSQL sessions
///
/// Sessions implement the extended protocol: deadlines are enforced with
/// `tokio::time::timeout_at` and transactions accept isolation options.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgDriver;

impl PgDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for PgDriver {
    async fn open(&self, dsn: &str) -> Result<Box<dyn Connection>, DomainError> {
        let conn = PgConnection::connect(dsn).await.map_err(|e| {
            error!(error = %e, "Failed to connect to PostgreSQL");
            DomainError::storage(format!("Failed to connect to database: {}", e))
        })?;

        debug!("Opened PostgreSQL session");

        Ok(Box::new(PgSession {
            conn: Arc::new(Mutex::new(Some(conn))),
        }))
    }
}

struct PgSession {
    conn: SharedConnection,
}

impl PgSession {
    async fn prepare_statement(&self, query: &str) -> Result<Box<dyn Statement>, DomainError> {
        let mut guard = self.conn.lock().await;
        let conn = open_connection(&mut guard)?;

        let prepared = conn
            .prepare(query)
            .await
            .map_err(|e| storage_error("prepare", query, e))?;

        let num_input = sqlx::Statement::parameters(&prepared).map(|params| match params {
            Either::Left(types) => types.len(),
            Either::Right(count) => count,
        });

        Ok(Box::new(PgStatement {
            conn: self.conn.clone(),
            query: query.to_string(),
            num_input,
        }))
    }

    async fn start(&self, statement: String) -> Result<Box<dyn Transaction>, DomainError> {
        run_simple(&self.conn, &statement).await?;

        Ok(Box::new(PgTransaction {
            conn: self.conn.clone(),
        }))
    }
}

#[async_trait]
impl Connection for PgSession {
    async fn prepare(&self, query: &str) -> Result<Box<dyn Statement>, DomainError> {
        self.prepare_statement(query).await
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, DomainError> {
        self.start("BEGIN".to_string()).await
    }

    async fn close(&self) -> Result<(), DomainError> {
        let Some(conn) = self.conn.lock().await.take() else {
            return Ok(());
        };

        conn.close()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to close connection: {}", e)))
    }

    fn negotiate(self: Box<Self>) -> Negotiated<dyn Connection, dyn ConnectionExt> {
        Negotiated::Extended(self)
    }
}

#[async_trait]
impl ConnectionExt for PgSession {
    async fn prepare_context(
        &self,
        ctx: &QueryContext,
        query: &str,
    ) -> Result<Box<dyn Statement>, DomainError> {
        within(ctx, self.prepare_statement(query)).await
    }

    async fn begin_tx(
        &self,
        ctx: &QueryContext,
        options: TxOptions,
    ) -> Result<Box<dyn Transaction>, DomainError> {
        within(ctx, self.start(begin_statement(options))).await
    }
}

struct PgStatement {
    conn: SharedConnection,
    query: String,
    num_input: Option<usize>,
}

impl PgStatement {
    async fn run_exec(&self, args: &[SqlValue]) -> Result<ExecResult, DomainError> {
        let mut guard = self.conn.lock().await;
        let conn = open_connection(&mut guard)?;

        let result = bind_all(sqlx::query(&self.query), args)
            .execute(conn)
            .await
            .map_err(|e| storage_error("exec", &self.query, e))?;

        Ok(ExecResult {
            rows_affected: result.rows_affected(),
        })
    }

    async fn run_query(&self, args: &[SqlValue]) -> Result<Vec<Row>, DomainError> {
        let mut guard = self.conn.lock().await;
        let conn = open_connection(&mut guard)?;

        let rows = bind_all(sqlx::query(&self.query), args)
            .fetch_all(conn)
            .await
            .map_err(|e| storage_error("query", &self.query, e))?;

        rows.iter().map(convert_row).collect()
    }
}

#[async_trait]
impl Statement for PgStatement {
    fn num_input(&self) -> Option<usize> {
        self.num_input
    }

    async fn exec(&self, args: &[SqlValue]) -> Result<ExecResult, DomainError> {
        self.run_exec(args).await
    }

    async fn query(&self, args: &[SqlValue]) -> Result<Vec<Row>, DomainError> {
        self.run_query(args).await
    }

    async fn close(&self) -> Result<(), DomainError> {
        Ok(())
    }

    fn negotiate(self: Box<Self>) -> Negotiated<dyn Statement, dyn StatementExt> {
        Negotiated::Extended(self)
    }
}

#[async_trait]
impl StatementExt for PgStatement {
    async fn exec_context(
        &self,
        ctx: &QueryContext,
        args: &[SqlValue],
    ) -> Result<ExecResult, DomainError> {
        within(ctx, self.run_exec(args)).await
    }

    async fn query_context(
        &self,
        ctx: &QueryContext,
        args: &[SqlValue],
    ) -> Result<Vec<Row>, DomainError> {
        within(ctx, self.run_query(args)).await
    }
}

struct PgTransaction {
    conn: SharedConnection,
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(&self) -> Result<(), DomainError> {
        run_simple(&self.conn, "COMMIT").await
    }

    async fn rollback(&self) -> Result<(), DomainError> {
        run_simple(&self.conn, "ROLLBACK").await
    }
}

fn open_connection(guard: &mut Option<PgConnection>) -> Result<&mut PgConnection, DomainError> {
    guard
        .as_mut()
        .ok_or_else(|| DomainError::storage("connection is closed"))
}

async fn run_simple(conn: &SharedConnection, statement: &str) -> Result<(), DomainError> {
    let mut guard = conn.lock().await;
    let conn = open_connection(&mut guard)?;

    conn.execute(statement)
        .await
        .map_err(|e| storage_error("exec", statement, e))?;

    Ok(())
}

async fn within<T, F>(ctx: &QueryContext, fut: F) -> Result<T, DomainError>
where
    F: Future<Output = Result<T, DomainError>>,
{
    ctx.check()?;

    match ctx.deadline() {
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| DomainError::deadline_exceeded("context deadline exceeded"))?,
        None => fut.await,
    }
}

fn begin_statement(options: TxOptions) -> String {
    let mut statement = String::from("BEGIN");

    let isolation = match options.isolation {
        IsolationLevel::Default => None,
        IsolationLevel::ReadUncommitted => Some("READ UNCOMMITTED"),
        IsolationLevel::ReadCommitted => Some("READ COMMITTED"),
        IsolationLevel::RepeatableRead => Some("REPEATABLE READ"),
        IsolationLevel::Serializable => Some("SERIALIZABLE"),
    };

    if let Some(level) = isolation {
        statement.push_str(" ISOLATION LEVEL ");
        statement.push_str(level);
    }

    if options.read_only {
        statement.push_str(" READ ONLY");
    }

    statement
}

fn storage_error(operation: &str, query: &str, e: sqlx::Error) -> DomainError {
    error!(operation, query, error = %e, "Database call failed");
    DomainError::storage(format!("Failed to {} '{}': {}", operation, query, e))
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    args: &'q [SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for arg in args {
        query = match arg {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Float(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_str()),
            SqlValue::Bytes(v) => query.bind(v.as_slice()),
            SqlValue::Timestamp(v) => query.bind(*v),
        };
    }

    query
}

fn decode<'r, T>(
    row: &'r PgRow,
    index: usize,
    wrap: impl FnOnce(T) -> SqlValue,
) -> Result<SqlValue, DomainError>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    let value: Option<T> = row
        .try_get(index)
        .map_err(|e| DomainError::storage(format!("Failed to decode column {}: {}", index, e)))?;

    Ok(value.map(wrap).unwrap_or(SqlValue::Null))
}

fn convert_row(row: &PgRow) -> Result<Row, DomainError> {
    let mut converted = Row::new();

    for (index, column) in row.columns().iter().enumerate() {
        let value = match column.type_info().name() {
            "INT8" => decode(row, index, SqlValue::Int)?,
            "INT4" => decode(row, index, |v: i32| SqlValue::Int(v.into()))?,
            "INT2" => decode(row, index, |v: i16| SqlValue::Int(v.into()))?,
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => decode(row, index, SqlValue::Text)?,
            "BOOL" => decode(row, index, SqlValue::Bool)?,
            "FLOAT4" => decode(row, index, |v: f32| SqlValue::Float(v.into()))?,
            "FLOAT8" => decode(row, index, SqlValue::Float)?,
            "BYTEA" => decode(row, index, SqlValue::Bytes)?,
            "TIMESTAMPTZ" => decode::<DateTime<Utc>>(row, index, SqlValue::Timestamp)?,
            "TIMESTAMP" => decode(row, index, |v: NaiveDateTime| SqlValue::Timestamp(v.and_utc()))?,
            other => {
                return Err(DomainError::storage(format!(
                    "Unsupported type {} for column '{}'",
                    other,
                    column.name()
                )));
            }
        };

        converted.push(column.name(), value);
    }

    Ok(converted)
}
