//! Database driver protocol
//!
//! Mirrors the open / prepare / exec / query / close lifecycle of a SQL
//! driver. Optional capabilities (context-aware prepare, exec and query,
//! transactions with options) live on extension traits; a connection or
//! statement exposes them through `negotiate`, which is called once when the
//! object is first wrapped so callers dispatch on the resolved variant.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::value::{ExecResult, Row, SqlValue};
use crate::domain::DomainError;

/// Per-call deadline carried by context-aware operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryContext {
    deadline: Option<Instant>,
}

impl QueryContext {
    /// A context without a deadline
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails if the deadline has already passed
    pub fn check(&self) -> Result<(), DomainError> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Err(DomainError::deadline_exceeded("context deadline exceeded"))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IsolationLevel {
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    pub isolation: IsolationLevel,
    pub read_only: bool,
}

impl TxOptions {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Result of capability negotiation: either only the basic protocol or the
/// extended one
pub enum Negotiated<B: ?Sized, E: ?Sized> {
    Basic(Box<B>),
    Extended(Box<E>),
}

impl<B: ?Sized, E: ?Sized> Negotiated<B, E> {
    pub fn is_extended(&self) -> bool {
        matches!(self, Self::Extended(_))
    }
}

/// Opens connections for a data source name
#[async_trait]
pub trait Driver: Send + Sync + Debug {
    async fn open(&self, dsn: &str) -> Result<Box<dyn Connection>, DomainError>;
}

/// A single database session
#[async_trait]
pub trait Connection: Send + Sync {
    async fn prepare(&self, query: &str) -> Result<Box<dyn Statement>, DomainError>;

    async fn begin(&self) -> Result<Box<dyn Transaction>, DomainError>;

    async fn close(&self) -> Result<(), DomainError>;

    /// Resolves which protocol variant this connection implements
    fn negotiate(self: Box<Self>) -> Negotiated<dyn Connection, dyn ConnectionExt>;
}

/// Connection capabilities beyond the basic protocol
#[async_trait]
pub trait ConnectionExt: Connection {
    async fn prepare_context(
        &self,
        ctx: &QueryContext,
        query: &str,
    ) -> Result<Box<dyn Statement>, DomainError>;

    async fn begin_tx(
        &self,
        ctx: &QueryContext,
        options: TxOptions,
    ) -> Result<Box<dyn Transaction>, DomainError>;
}

/// A prepared statement bound to its connection
#[async_trait]
pub trait Statement: Send + Sync {
    /// Number of placeholders, `None` when the driver cannot tell
    fn num_input(&self) -> Option<usize>;

    async fn exec(&self, args: &[SqlValue]) -> Result<ExecResult, DomainError>;

    async fn query(&self, args: &[SqlValue]) -> Result<Vec<Row>, DomainError>;

    async fn close(&self) -> Result<(), DomainError>;

    fn negotiate(self: Box<Self>) -> Negotiated<dyn Statement, dyn StatementExt>;
}

/// Statement capabilities beyond the basic protocol
#[async_trait]
pub trait StatementExt: Statement {
    async fn exec_context(
        &self,
        ctx: &QueryContext,
        args: &[SqlValue],
    ) -> Result<ExecResult, DomainError>;

    async fn query_context(
        &self,
        ctx: &QueryContext,
        args: &[SqlValue],
    ) -> Result<Vec<Row>, DomainError>;
}

#[async_trait]
pub trait Transaction: Send + Sync {
    async fn commit(&self) -> Result<(), DomainError>;

    async fn rollback(&self) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tx_options() {
        assert!(TxOptions::default().is_default());

        let serializable = TxOptions {
            isolation: IsolationLevel::Serializable,
            read_only: false,
        };
        assert!(!serializable.is_default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_deadline() {
        let ctx = QueryContext::with_timeout(Duration::from_millis(10));
        assert!(ctx.check().is_ok());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(ctx.check().unwrap_err().is_deadline_exceeded());
        assert!(QueryContext::background().check().is_ok());
    }
}
