//! Pooled database handle over a registered driver

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use deadpool::Runtime;
use deadpool::managed::{self, Metrics, Object, Pool, PoolError, RecycleError, RecycleResult};
use tracing::{debug, warn};

use crate::domain::DomainError;
use crate::domain::sql::{
    Connection, ConnectionExt, Driver, ExecResult, Negotiated, QueryContext, Row, SqlValue,
    Statement, StatementExt,
};

/// Pool sizing for a [`Database`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    /// Upper bound on open connections
    pub max_size: usize,
    /// How long a caller waits for a free connection; `None` waits forever
    pub acquire_timeout: Option<Duration>,
}

impl PoolOptions {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            acquire_timeout: None,
        }
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }
}

/// Connection held by the pool, negotiated once when it is opened
pub struct PooledConnection {
    conn: Negotiated<dyn Connection, dyn ConnectionExt>,
    broken: bool,
}

/// Opens driver connections for the pool and refuses to hand back broken ones
#[derive(Debug)]
pub struct ConnectionManager {
    driver: Arc<dyn Driver>,
    dsn: String,
}

impl managed::Manager for ConnectionManager {
    type Type = PooledConnection;
    type Error = DomainError;

    async fn create(&self) -> Result<PooledConnection, DomainError> {
        debug!("Opening new database connection");
        let conn = self.driver.open(&self.dsn).await?;

        Ok(PooledConnection {
            conn: conn.negotiate(),
            broken: false,
        })
    }

    async fn recycle(
        &self,
        conn: &mut PooledConnection,
        _metrics: &Metrics,
    ) -> RecycleResult<DomainError> {
        if conn.broken {
            return Err(RecycleError::Message(
                "connection failed with a storage error".into(),
            ));
        }
        Ok(())
    }
}

/// Shared handle that hands out pooled driver connections
///
/// At most `max_size` connections are open at once; further callers wait for
/// one to be returned. A connection whose call failed with a storage error is
/// never handed out again.
pub struct Database {
    pool: Pool<ConnectionManager>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.pool.status();
        f.debug_struct("Database")
            .field("max_size", &status.max_size)
            .field("size", &status.size)
            .field("idle", &status.available)
            .finish_non_exhaustive()
    }
}

impl Database {
    pub fn new(
        driver: Arc<dyn Driver>,
        dsn: impl Into<String>,
        options: PoolOptions,
    ) -> Result<Self, DomainError> {
        if options.max_size == 0 {
            return Err(DomainError::configuration(
                "Database pool needs room for at least one connection",
            ));
        }

        let manager = ConnectionManager {
            driver,
            dsn: dsn.into(),
        };

        let pool = Pool::builder(manager)
            .max_size(options.max_size)
            .wait_timeout(options.acquire_timeout)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build database pool: {}", e)))?;

        Ok(Self { pool })
    }

    /// Open connections, idle or in use
    pub fn size(&self) -> usize {
        self.pool.status().size
    }

    pub fn idle_count(&self) -> usize {
        self.pool.status().available
    }

    pub async fn query(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<Row>, DomainError> {
        self.query_context(&QueryContext::background(), sql, args)
            .await
    }

    /// Returns the first row, `None` when the query matched nothing
    pub async fn query_optional(
        &self,
        sql: &str,
        args: &[SqlValue],
    ) -> Result<Option<Row>, DomainError> {
        Ok(self.query(sql, args).await?.into_iter().next())
    }

    pub async fn exec(&self, sql: &str, args: &[SqlValue]) -> Result<ExecResult, DomainError> {
        self.exec_context(&QueryContext::background(), sql, args)
            .await
    }

    pub async fn query_context(
        &self,
        ctx: &QueryContext,
        sql: &str,
        args: &[SqlValue],
    ) -> Result<Vec<Row>, DomainError> {
        let mut conn = self.acquire(ctx).await?;

        let result = async {
            let statement = prepare(&conn.conn, ctx, sql).await?;
            let rows = match &statement {
                Negotiated::Extended(statement) => statement.query_context(ctx, args).await,
                Negotiated::Basic(statement) => {
                    ctx.check()?;
                    statement.query(args).await
                }
            };
            close_statement(&statement).await;
            rows
        }
        .await;

        mark_failed(&mut conn, &result);
        result
    }

    pub async fn exec_context(
        &self,
        ctx: &QueryContext,
        sql: &str,
        args: &[SqlValue],
    ) -> Result<ExecResult, DomainError> {
        let mut conn = self.acquire(ctx).await?;

        let result = async {
            let statement = prepare(&conn.conn, ctx, sql).await?;
            let outcome = match &statement {
                Negotiated::Extended(statement) => statement.exec_context(ctx, args).await,
                Negotiated::Basic(statement) => {
                    ctx.check()?;
                    statement.exec(args).await
                }
            };
            close_statement(&statement).await;
            outcome
        }
        .await;

        mark_failed(&mut conn, &result);
        result
    }

    /// Closes every idle connection and stops handing out new ones
    pub async fn close(&self) -> Result<(), DomainError> {
        let drained = self.pool.retain(|_, _| false).removed;
        self.pool.close();

        futures::future::try_join_all(drained.iter().map(|pooled| async move {
            match &pooled.conn {
                Negotiated::Basic(conn) => conn.close().await,
                Negotiated::Extended(conn) => conn.close().await,
            }
        }))
        .await?;

        Ok(())
    }

    /// Waits for a connection, giving up at the context deadline
    ///
    /// An expired context fails before any connection is taken.
    async fn acquire(&self, ctx: &QueryContext) -> Result<Object<ConnectionManager>, DomainError> {
        ctx.check()?;

        let pooled = match ctx.deadline() {
            Some(deadline) => tokio::time::timeout_at(deadline, self.pool.get())
                .await
                .map_err(|_| DomainError::deadline_exceeded("waiting for a database connection"))?,
            None => self.pool.get().await,
        };

        pooled.map_err(pool_error)
    }
}

fn pool_error(err: PoolError<DomainError>) -> DomainError {
    match err {
        PoolError::Backend(e) => e,
        PoolError::Timeout(_) => DomainError::storage("Timed out waiting for a database connection"),
        PoolError::Closed => DomainError::storage("Database pool is closed"),
        other => DomainError::internal(other.to_string()),
    }
}

fn mark_failed<T>(conn: &mut Object<ConnectionManager>, result: &Result<T, DomainError>) {
    if let Err(e) = result {
        if e.is_storage() {
            warn!(error = %e, "Discarding database connection after storage error");
            conn.broken = true;
        }
    }
}

async fn prepare(
    conn: &Negotiated<dyn Connection, dyn ConnectionExt>,
    ctx: &QueryContext,
    sql: &str,
) -> Result<Negotiated<dyn Statement, dyn StatementExt>, DomainError> {
    let statement = match conn {
        Negotiated::Extended(conn) => conn.prepare_context(ctx, sql).await?,
        Negotiated::Basic(conn) => {
            ctx.check()?;
            conn.prepare(sql).await?
        }
    };

    Ok(statement.negotiate())
}

async fn close_statement(statement: &Negotiated<dyn Statement, dyn StatementExt>) {
    let closed = match statement {
        Negotiated::Basic(statement) => statement.close().await,
        Negotiated::Extended(statement) => statement.close().await,
    };

    if let Err(e) = closed {
        warn!(error = %e, "Failed to close statement");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sql::mock::FakeDriver;

    fn row(id: i64) -> Row {
        Row::new().with("id", id)
    }

    fn database(fake: &FakeDriver, max_size: usize) -> Database {
        Database::new(Arc::new(fake.clone()), "dsn", PoolOptions::new(max_size)).unwrap()
    }

    #[tokio::test]
    async fn test_query_reuses_idle_connection() {
        let fake = FakeDriver::extended().with_rows(vec![row(1)]);
        let db = Database::new(Arc::new(fake.clone()), "postgres://db", PoolOptions::new(2)).unwrap();

        db.query("SELECT 1", &[]).await.unwrap();
        db.query("SELECT 1", &[]).await.unwrap();

        assert_eq!(fake.opened(), 1);
        assert_eq!(db.idle_count(), 1);
    }

    #[tokio::test]
    async fn test_query_optional() {
        let fake = FakeDriver::extended().with_rows(vec![row(7), row(8)]);
        let db = database(&fake, 1);

        let first = db.query_optional("SELECT id FROM items", &[]).await.unwrap();
        assert_eq!(first.unwrap().get_i64("id").unwrap(), 7);

        let empty = database(&FakeDriver::extended(), 1);
        assert!(empty.query_optional("SELECT 1", &[]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exec_uses_context_calls_on_extended_driver() {
        let fake = FakeDriver::extended();
        let db = database(&fake, 1);

        let result = db.exec("DELETE FROM configs", &[]).await.unwrap();
        assert_eq!(result.rows_affected, 1);
        assert_eq!(
            fake.events(),
            vec![
                "open dsn",
                "prepare_context DELETE FROM configs",
                "exec_context DELETE FROM configs"
            ]
        );
    }

    #[tokio::test]
    async fn test_basic_driver_uses_simple_calls() {
        let fake = FakeDriver::basic();
        let db = database(&fake, 1);

        db.query("SELECT 1", &[]).await.unwrap();
        assert_eq!(fake.events(), vec!["open dsn", "prepare SELECT 1", "query SELECT 1"]);
    }

    #[tokio::test]
    async fn test_storage_error_drops_connection() {
        let fake = FakeDriver::extended();
        let db = database(&fake, 4);

        fake.fail_next("broken pipe");
        assert!(db.query("SELECT 1", &[]).await.unwrap_err().is_storage());

        db.query("SELECT 1", &[]).await.unwrap();
        assert_eq!(fake.opened(), 2);
        assert_eq!(db.size(), 1);
    }

    #[tokio::test]
    async fn test_expired_context_keeps_idle_connection() {
        let fake = FakeDriver::basic();
        let db = database(&fake, 2);
        db.query("SELECT 1", &[]).await.unwrap();

        let expired = QueryContext::with_deadline(tokio::time::Instant::now());
        let err = db.query_context(&expired, "SELECT 1", &[]).await.unwrap_err();
        assert!(err.is_deadline_exceeded());
        assert_eq!(db.idle_count(), 1);

        db.query("SELECT 1", &[]).await.unwrap();
        assert_eq!(fake.opened(), 1);
    }

    #[tokio::test]
    async fn test_expired_context_on_exec_touches_no_connection() {
        let fake = FakeDriver::extended();
        let db = database(&fake, 1);

        let expired = QueryContext::with_deadline(tokio::time::Instant::now());
        let err = db.exec_context(&expired, "DELETE FROM configs", &[]).await.unwrap_err();

        assert!(err.is_deadline_exceeded());
        assert!(fake.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_connections_are_bounded() {
        let fake = FakeDriver::extended().with_latency(Duration::from_millis(10));
        let db = database(&fake, 2);

        let results =
            futures::future::join_all((0..50).map(|_| db.query("SELECT 1", &[]))).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(fake.opened(), 2);
        assert_eq!(db.size(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_times_out_when_pool_is_busy() {
        let fake = FakeDriver::extended().with_latency(Duration::from_secs(1));
        let options = PoolOptions::new(1).acquire_timeout(Duration::from_millis(50));
        let db = Database::new(Arc::new(fake.clone()), "dsn", options).unwrap();

        let (first, second) = tokio::join!(db.query("SELECT 1", &[]), db.query("SELECT 2", &[]));

        assert!(first.is_ok());
        let err = second.unwrap_err();
        assert!(err.is_storage());
        assert!(err.to_string().contains("Timed out"));
        assert_eq!(fake.opened(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_deadline_bounds_acquire_wait() {
        let fake = FakeDriver::extended().with_latency(Duration::from_secs(1));
        let db = database(&fake, 1);
        let ctx = QueryContext::with_timeout(Duration::from_millis(20));

        let (first, second) = tokio::join!(
            db.query("SELECT 1", &[]),
            db.query_context(&ctx, "SELECT 2", &[])
        );

        assert!(first.is_ok());
        assert!(second.unwrap_err().is_deadline_exceeded());
    }

    #[test]
    fn test_empty_pool_is_rejected() {
        let err = Database::new(Arc::new(FakeDriver::extended()), "dsn", PoolOptions::new(0))
            .unwrap_err();
        assert!(matches!(err, DomainError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_close_drains_idle_connections() {
        let fake = FakeDriver::extended();
        let db = database(&fake, 2);
        db.query("SELECT 1", &[]).await.unwrap();

        db.close().await.unwrap();

        assert_eq!(db.idle_count(), 0);
        assert_eq!(fake.events().last().map(String::as_str), Some("close"));
        assert!(db.query("SELECT 1", &[]).await.unwrap_err().is_storage());
    }
}
