//! Relational stores behind the caching repositories

mod config;
mod record;

pub use config::SqlConfigStore;
pub use record::SqlRecordStore;
