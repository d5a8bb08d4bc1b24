//! SQL drivers and the pooled database handle

mod database;
mod postgres;
pub mod querylog;
mod registry;

pub use database::{ConnectionManager, Database, PoolOptions};
pub use postgres::PgDriver;
pub use querylog::{QueryLogBackend, QueryLogSink, QueryLogger};
pub use registry::{
    DriverRegistry, POSTGRES_DRIVER, QUERY_LOG_DRIVER, register_default_drivers,
    register_query_log_driver,
};
