//! In-process fake driver used to exercise driver decorators and the
//! database handle

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::driver::{
    Connection, ConnectionExt, Driver, Negotiated, QueryContext, Statement, StatementExt,
    Transaction, TxOptions,
};
use super::value::{ExecResult, Row, SqlValue};
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct FakeState {
    events: Mutex<Vec<String>>,
    opened: AtomicUsize,
    fail_next: Mutex<Option<String>>,
}

impl FakeState {
    fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    fn take_failure(&self) -> Result<(), DomainError> {
        match self.fail_next.lock().unwrap().take() {
            Some(message) => Err(DomainError::storage(message)),
            None => Ok(()),
        }
    }
}

/// Fake driver whose statements sleep for `latency` and return `rows`
#[derive(Debug, Clone)]
pub struct FakeDriver {
    state: Arc<FakeState>,
    latency: Duration,
    extended: bool,
    rows: Arc<Vec<Row>>,
}

impl FakeDriver {
    /// A driver implementing the full extended protocol
    pub fn extended() -> Self {
        Self {
            state: Arc::new(FakeState::default()),
            latency: Duration::ZERO,
            extended: true,
            rows: Arc::new(Vec::new()),
        }
    }

    /// A driver implementing only the basic protocol
    pub fn basic() -> Self {
        Self {
            extended: false,
            ..Self::extended()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = Arc::new(rows);
        self
    }

    /// Makes the next prepare, exec or query fail with a storage error
    pub fn fail_next(&self, message: impl Into<String>) {
        *self.state.fail_next.lock().unwrap() = Some(message.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.state.events.lock().unwrap().clone()
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn open(&self, dsn: &str) -> Result<Box<dyn Connection>, DomainError> {
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        self.state.record(format!("open {}", dsn));

        Ok(Box::new(FakeConnection {
            driver: self.clone(),
        }))
    }
}

struct FakeConnection {
    driver: FakeDriver,
}

impl FakeConnection {
    fn statement(&self, query: &str) -> Box<dyn Statement> {
        Box::new(FakeStatement {
            driver: self.driver.clone(),
            query: query.to_string(),
        })
    }
}

#[async_trait]
impl Connection for FakeConnection {
    async fn prepare(&self, query: &str) -> Result<Box<dyn Statement>, DomainError> {
        self.driver.state.take_failure()?;
        self.driver.state.record(format!("prepare {}", query));
        Ok(self.statement(query))
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, DomainError> {
        self.driver.state.record("begin");
        Ok(Box::new(FakeTransaction {
            driver: self.driver.clone(),
        }))
    }

    async fn close(&self) -> Result<(), DomainError> {
        self.driver.state.record("close");
        Ok(())
    }

    fn negotiate(self: Box<Self>) -> Negotiated<dyn Connection, dyn ConnectionExt> {
        if self.driver.extended {
            Negotiated::Extended(self)
        } else {
            Negotiated::Basic(self)
        }
    }
}

#[async_trait]
impl ConnectionExt for FakeConnection {
    async fn prepare_context(
        &self,
        _ctx: &QueryContext,
        query: &str,
    ) -> Result<Box<dyn Statement>, DomainError> {
        self.driver.state.take_failure()?;
        self.driver.state.record(format!("prepare_context {}", query));
        Ok(self.statement(query))
    }

    async fn begin_tx(
        &self,
        _ctx: &QueryContext,
        options: TxOptions,
    ) -> Result<Box<dyn Transaction>, DomainError> {
        self.driver
            .state
            .record(format!("begin_tx {:?}", options.isolation));
        Ok(Box::new(FakeTransaction {
            driver: self.driver.clone(),
        }))
    }
}

struct FakeStatement {
    driver: FakeDriver,
    query: String,
}

impl FakeStatement {
    async fn run(&self, call: &str) -> Result<(), DomainError> {
        tokio::time::sleep(self.driver.latency).await;
        self.driver.state.take_failure()?;
        self.driver.state.record(format!("{} {}", call, self.query));
        Ok(())
    }
}

#[async_trait]
impl Statement for FakeStatement {
    fn num_input(&self) -> Option<usize> {
        Some(self.query.matches('$').count())
    }

    async fn exec(&self, _args: &[SqlValue]) -> Result<ExecResult, DomainError> {
        self.run("exec").await?;
        Ok(ExecResult { rows_affected: 1 })
    }

    async fn query(&self, _args: &[SqlValue]) -> Result<Vec<Row>, DomainError> {
        self.run("query").await?;
        Ok(self.driver.rows.as_ref().clone())
    }

    async fn close(&self) -> Result<(), DomainError> {
        Ok(())
    }

    fn negotiate(self: Box<Self>) -> Negotiated<dyn Statement, dyn StatementExt> {
        if self.driver.extended {
            Negotiated::Extended(self)
        } else {
            Negotiated::Basic(self)
        }
    }
}

#[async_trait]
impl StatementExt for FakeStatement {
    async fn exec_context(
        &self,
        _ctx: &QueryContext,
        _args: &[SqlValue],
    ) -> Result<ExecResult, DomainError> {
        self.run("exec_context").await?;
        Ok(ExecResult { rows_affected: 1 })
    }

    async fn query_context(
        &self,
        _ctx: &QueryContext,
        _args: &[SqlValue],
    ) -> Result<Vec<Row>, DomainError> {
        self.run("query_context").await?;
        Ok(self.driver.rows.as_ref().clone())
    }
}

struct FakeTransaction {
    driver: FakeDriver,
}

#[async_trait]
impl Transaction for FakeTransaction {
    async fn commit(&self) -> Result<(), DomainError> {
        self.driver.state.record("commit");
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DomainError> {
        self.driver.state.record("rollback");
        Ok(())
    }
}
