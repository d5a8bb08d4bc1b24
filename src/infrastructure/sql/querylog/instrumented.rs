//! Timing decorator over any driver
//!
//! Statement executions are timed and forwarded to the query logger.
//! Capabilities are negotiated once when a connection or statement is
//! wrapped; the decorator itself always offers the extended protocol and
//! falls back to the simple calls when the wrapped object lacks it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::sink::QueryLogSink;
use crate::domain::DomainError;
use crate::domain::sql::{
    Connection, ConnectionExt, Driver, ExecResult, Negotiated, QueryContext, Row, SqlValue,
    Statement, StatementExt, Transaction, TxOptions,
};

/// Sink plus minimum duration, fixed at driver registration
#[derive(Debug, Clone, Default)]
pub struct QueryLogger {
    sink: Option<Arc<dyn QueryLogSink>>,
    min_duration: Duration,
}

impl QueryLogger {
    /// A zero `min_duration` logs every statement
    pub fn new(sink: Arc<dyn QueryLogSink>, min_duration: Duration) -> Self {
        Self {
            sink: Some(sink),
            min_duration,
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn min_duration(&self) -> Duration {
        self.min_duration
    }

    /// Logs `query` if the time since `started` reaches the threshold
    pub fn observe(&self, started: Instant, query: &str) {
        let Some(sink) = &self.sink else {
            return;
        };

        let elapsed = started.elapsed();
        if elapsed >= self.min_duration {
            sink.log(elapsed, query);
        }
    }

    async fn time<T>(&self, query: &str, call: impl Future<Output = T>) -> T {
        let started = Instant::now();
        let outcome = call.await;
        self.observe(started, query);
        outcome
    }
}

/// Driver wrapper that times statement execution
#[derive(Debug)]
pub struct InstrumentedDriver {
    inner: Arc<dyn Driver>,
    logger: QueryLogger,
}

impl InstrumentedDriver {
    pub fn new(inner: Arc<dyn Driver>, logger: QueryLogger) -> Self {
        Self { inner, logger }
    }

    pub fn logger(&self) -> &QueryLogger {
        &self.logger
    }
}

#[async_trait]
impl Driver for InstrumentedDriver {
    async fn open(&self, dsn: &str) -> Result<Box<dyn Connection>, DomainError> {
        let conn = self.inner.open(dsn).await?;
        Ok(Box::new(InstrumentedConnection::new(conn, self.logger.clone())))
    }
}

pub struct InstrumentedConnection {
    inner: Negotiated<dyn Connection, dyn ConnectionExt>,
    logger: QueryLogger,
}

impl InstrumentedConnection {
    pub fn new(conn: Box<dyn Connection>, logger: QueryLogger) -> Self {
        Self {
            inner: conn.negotiate(),
            logger,
        }
    }

    /// Whether the wrapped connection implements the extended protocol
    pub fn wraps_extended(&self) -> bool {
        self.inner.is_extended()
    }

    fn wrap(&self, statement: Box<dyn Statement>, query: &str) -> Box<dyn Statement> {
        Box::new(InstrumentedStatement {
            inner: statement.negotiate(),
            query: query.to_string(),
            logger: self.logger.clone(),
        })
    }
}

#[async_trait]
impl Connection for InstrumentedConnection {
    async fn prepare(&self, query: &str) -> Result<Box<dyn Statement>, DomainError> {
        let statement = match &self.inner {
            Negotiated::Basic(conn) => conn.prepare(query).await?,
            Negotiated::Extended(conn) => conn.prepare(query).await?,
        };

        Ok(self.wrap(statement, query))
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, DomainError> {
        match &self.inner {
            Negotiated::Basic(conn) => conn.begin().await,
            Negotiated::Extended(conn) => conn.begin().await,
        }
    }

    async fn close(&self) -> Result<(), DomainError> {
        match &self.inner {
            Negotiated::Basic(conn) => conn.close().await,
            Negotiated::Extended(conn) => conn.close().await,
        }
    }

    fn negotiate(self: Box<Self>) -> Negotiated<dyn Connection, dyn ConnectionExt> {
        Negotiated::Extended(self)
    }
}

#[async_trait]
impl ConnectionExt for InstrumentedConnection {
    async fn prepare_context(
        &self,
        ctx: &QueryContext,
        query: &str,
    ) -> Result<Box<dyn Statement>, DomainError> {
        let statement = match &self.inner {
            Negotiated::Extended(conn) => conn.prepare_context(ctx, query).await?,
            Negotiated::Basic(conn) => {
                ctx.check()?;
                conn.prepare(query).await?
            }
        };

        Ok(self.wrap(statement, query))
    }

    async fn begin_tx(
        &self,
        ctx: &QueryContext,
        options: TxOptions,
    ) -> Result<Box<dyn Transaction>, DomainError> {
        match &self.inner {
            Negotiated::Extended(conn) => conn.begin_tx(ctx, options).await,
            Negotiated::Basic(_) if !options.is_default() => Err(DomainError::unsupported(
                "driver does not support non-default transaction options",
            )),
            Negotiated::Basic(conn) => {
                ctx.check()?;
                conn.begin().await
            }
        }
    }
}

pub struct InstrumentedStatement {
    inner: Negotiated<dyn Statement, dyn StatementExt>,
    query: String,
    logger: QueryLogger,
}

#[async_trait]
impl Statement for InstrumentedStatement {
    fn num_input(&self) -> Option<usize> {
        match &self.inner {
            Negotiated::Basic(statement) => statement.num_input(),
            Negotiated::Extended(statement) => statement.num_input(),
        }
    }

    async fn exec(&self, args: &[SqlValue]) -> Result<ExecResult, DomainError> {
        let call = async {
            match &self.inner {
                Negotiated::Basic(statement) => statement.exec(args).await,
                Negotiated::Extended(statement) => statement.exec(args).await,
            }
        };

        self.logger.time(&self.query, call).await
    }

    async fn query(&self, args: &[SqlValue]) -> Result<Vec<Row>, DomainError> {
        let call = async {
            match &self.inner {
                Negotiated::Basic(statement) => statement.query(args).await,
                Negotiated::Extended(statement) => statement.query(args).await,
            }
        };

        self.logger.time(&self.query, call).await
    }

    async fn close(&self) -> Result<(), DomainError> {
        match &self.inner {
            Negotiated::Basic(statement) => statement.close().await,
            Negotiated::Extended(statement) => statement.close().await,
        }
    }

    fn negotiate(self: Box<Self>) -> Negotiated<dyn Statement, dyn StatementExt> {
        Negotiated::Extended(self)
    }
}

#[async_trait]
impl StatementExt for InstrumentedStatement {
    async fn exec_context(
        &self,
        ctx: &QueryContext,
        args: &[SqlValue],
    ) -> Result<ExecResult, DomainError> {
        match &self.inner {
            Negotiated::Extended(statement) => {
                self.logger
                    .time(&self.query, statement.exec_context(ctx, args))
                    .await
            }
            Negotiated::Basic(statement) => {
                ctx.check()?;
                self.logger.time(&self.query, statement.exec(args)).await
            }
        }
    }

    async fn query_context(
        &self,
        ctx: &QueryContext,
        args: &[SqlValue],
    ) -> Result<Vec<Row>, DomainError> {
        match &self.inner {
            Negotiated::Extended(statement) => {
                self.logger
                    .time(&self.query, statement.query_context(ctx, args))
                    .await
            }
            Negotiated::Basic(statement) => {
                ctx.check()?;
                self.logger.time(&self.query, statement.query(args)).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sql::IsolationLevel;
    use crate::domain::sql::mock::FakeDriver;
    use crate::infrastructure::sql::querylog::sink::mock::CaptureSink;

    const SELECT_USER: &str = "SELECT * FROM users WHERE id = $1";

    async fn open_ext(
        fake: &FakeDriver,
        logger: QueryLogger,
    ) -> Box<dyn ConnectionExt> {
        let driver = InstrumentedDriver::new(Arc::new(fake.clone()), logger);
        match driver.open("dsn").await.unwrap().negotiate() {
            Negotiated::Extended(conn) => conn,
            Negotiated::Basic(_) => panic!("instrumented connection must be extended"),
        }
    }

    async fn prepare_ext(conn: &dyn ConnectionExt, query: &str) -> Box<dyn StatementExt> {
        let statement = conn
            .prepare_context(&QueryContext::background(), query)
            .await
            .unwrap();
        match statement.negotiate() {
            Negotiated::Extended(statement) => statement,
            Negotiated::Basic(_) => panic!("instrumented statement must be extended"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_query_is_logged_once_verbatim() {
        let fake = FakeDriver::extended().with_latency(Duration::from_millis(20));
        let sink = CaptureSink::new();
        let conn = open_ext(&fake, QueryLogger::new(sink.clone(), Duration::from_millis(10))).await;

        let statement = prepare_ext(conn.as_ref(), SELECT_USER).await;
        statement
            .query_context(&QueryContext::background(), &[SqlValue::Int(42)])
            .await
            .unwrap();

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].0 >= Duration::from_millis(20));
        assert_eq!(entries[0].1, SELECT_USER);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_query_is_not_logged() {
        let fake = FakeDriver::extended().with_latency(Duration::from_millis(5));
        let sink = CaptureSink::new();
        let conn = open_ext(&fake, QueryLogger::new(sink.clone(), Duration::from_millis(10))).await;

        let statement = prepare_ext(conn.as_ref(), SELECT_USER).await;
        statement
            .exec_context(&QueryContext::background(), &[SqlValue::Int(1)])
            .await
            .unwrap();

        assert!(sink.entries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_is_inclusive() {
        let fake = FakeDriver::extended().with_latency(Duration::from_millis(10));
        let sink = CaptureSink::new();
        let conn = open_ext(&fake, QueryLogger::new(sink.clone(), Duration::from_millis(10))).await;

        let statement = prepare_ext(conn.as_ref(), SELECT_USER).await;
        statement.query(&[SqlValue::Int(1)]).await.unwrap();

        assert_eq!(sink.queries(), vec![SELECT_USER.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_threshold_logs_everything() {
        let fake = FakeDriver::extended();
        let sink = CaptureSink::new();
        let conn = open_ext(&fake, QueryLogger::new(sink.clone(), Duration::ZERO)).await;

        let statement = prepare_ext(conn.as_ref(), "UPDATE users SET last_bump = $1").await;
        statement.exec(&[SqlValue::Int(0)]).await.unwrap();
        statement
            .exec_context(&QueryContext::background(), &[SqlValue::Int(0)])
            .await
            .unwrap();

        assert_eq!(sink.entries().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_statement_is_still_timed() {
        let fake = FakeDriver::extended();
        let sink = CaptureSink::new();
        let conn = open_ext(&fake, QueryLogger::new(sink.clone(), Duration::ZERO)).await;

        let statement = prepare_ext(conn.as_ref(), SELECT_USER).await;
        fake.fail_next("connection reset");
        assert!(statement.query(&[]).await.is_err());

        assert_eq!(sink.queries(), vec![SELECT_USER.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_logger_never_logs() {
        let fake = FakeDriver::extended().with_latency(Duration::from_secs(1));
        let conn = open_ext(&fake, QueryLogger::disabled()).await;

        let statement = prepare_ext(conn.as_ref(), SELECT_USER).await;
        statement.query(&[]).await.unwrap();

        assert!(!QueryLogger::disabled().is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_basic_driver_falls_back_to_simple_calls() {
        let fake = FakeDriver::basic();
        let sink = CaptureSink::new();
        let conn = open_ext(&fake, QueryLogger::new(sink.clone(), Duration::ZERO)).await;

        let statement = prepare_ext(conn.as_ref(), SELECT_USER).await;
        statement
            .query_context(&QueryContext::background(), &[SqlValue::Int(7)])
            .await
            .unwrap();

        assert_eq!(
            fake.events(),
            vec![
                "open dsn".to_string(),
                format!("prepare {}", SELECT_USER),
                format!("query {}", SELECT_USER),
            ]
        );
        assert_eq!(sink.entries().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extended_driver_receives_context_calls() {
        let fake = FakeDriver::extended();
        let conn = open_ext(&fake, QueryLogger::disabled()).await;

        let statement = prepare_ext(conn.as_ref(), SELECT_USER).await;
        statement
            .query_context(&QueryContext::background(), &[])
            .await
            .unwrap();

        assert_eq!(
            fake.events(),
            vec![
                "open dsn".to_string(),
                format!("prepare_context {}", SELECT_USER),
                format!("query_context {}", SELECT_USER),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_basic_fallback_honours_expired_deadline() {
        let fake = FakeDriver::basic();
        let sink = CaptureSink::new();
        let conn = open_ext(&fake, QueryLogger::new(sink.clone(), Duration::ZERO)).await;
        let statement = prepare_ext(conn.as_ref(), SELECT_USER).await;

        let ctx = QueryContext::with_timeout(Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(5)).await;

        let err = statement.query_context(&ctx, &[]).await.unwrap_err();
        assert!(err.is_deadline_exceeded());
        assert!(sink.entries().is_empty());
    }

    #[tokio::test]
    async fn test_transactions_pass_through_untimed() {
        let fake = FakeDriver::extended();
        let sink = CaptureSink::new();
        let conn = open_ext(&fake, QueryLogger::new(sink.clone(), Duration::ZERO)).await;

        let tx = conn
            .begin_tx(
                &QueryContext::background(),
                TxOptions {
                    isolation: IsolationLevel::Serializable,
                    read_only: false,
                },
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(
            fake.events(),
            vec!["open dsn", "begin_tx Serializable", "commit"]
        );
        assert!(sink.entries().is_empty());
    }

    #[tokio::test]
    async fn test_basic_driver_rejects_tx_options() {
        let fake = FakeDriver::basic();
        let conn = open_ext(&fake, QueryLogger::disabled()).await;

        let options = TxOptions {
            isolation: IsolationLevel::RepeatableRead,
            read_only: true,
        };
        let err = match conn.begin_tx(&QueryContext::background(), options).await {
            Err(err) => err,
            Ok(_) => panic!("non-default options must be rejected"),
        };
        assert!(matches!(err, DomainError::Unsupported { .. }));

        let tx = conn
            .begin_tx(&QueryContext::background(), TxOptions::default())
            .await
            .unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(fake.events(), vec!["open dsn", "begin", "rollback"]);
    }

    #[tokio::test]
    async fn test_num_input_and_negotiation_are_forwarded() {
        let fake = FakeDriver::basic();
        let driver = InstrumentedDriver::new(Arc::new(fake.clone()), QueryLogger::disabled());
        let conn = driver.open("dsn").await.unwrap();

        let statement = conn.prepare("SELECT $1, $2").await.unwrap();
        assert_eq!(statement.num_input(), Some(2));

        let wrapped = InstrumentedConnection::new(fake.open("dsn").await.unwrap(), QueryLogger::disabled());
        assert!(!wrapped.wraps_extended());
    }
}
