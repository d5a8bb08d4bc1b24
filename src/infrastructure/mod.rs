//! Infrastructure layer - cache, database and logging implementations

pub mod cache;
pub mod logging;
pub mod sql;
pub mod store;
