//! SQL driver protocol shared by the database handle and driver decorators

mod driver;
mod value;

#[cfg(test)]
pub mod mock;

pub use driver::{
    Connection, ConnectionExt, Driver, IsolationLevel, Negotiated, QueryContext, Statement,
    StatementExt, Transaction, TxOptions,
};
pub use value::{ExecResult, Row, SqlValue};
