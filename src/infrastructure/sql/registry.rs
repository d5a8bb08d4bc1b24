//! Named driver registry

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use tracing::info;

use super::database::{Database, PoolOptions};
use super::postgres::PgDriver;
use super::querylog::{InstrumentedDriver, QueryLogger};
use crate::domain::DomainError;
use crate::domain::sql::Driver;

/// Name the plain PostgreSQL driver is registered under
pub const POSTGRES_DRIVER: &str = "postgres";

/// Name the query-logging PostgreSQL driver is registered under
pub const QUERY_LOG_DRIVER: &str = "querylog";

static GLOBAL: Lazy<DriverRegistry> = Lazy::new(DriverRegistry::new);

/// Maps driver names to drivers
///
/// Connection settings pick a driver by name, so wrapping is opted into per
/// data source.
#[derive(Debug, Default)]
pub struct DriverRegistry {
    drivers: RwLock<HashMap<String, Arc<dyn Driver>>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> &'static DriverRegistry {
        &GLOBAL
    }

    /// Registers `driver` under `name`; each name can be registered once
    pub fn register(&self, name: &str, driver: Arc<dyn Driver>) -> Result<(), DomainError> {
        let mut drivers = self
            .drivers
            .write()
            .map_err(|_| DomainError::internal("Driver registry lock poisoned"))?;

        if drivers.contains_key(name) {
            return Err(DomainError::configuration(format!(
                "Driver '{}' is already registered",
                name
            )));
        }

        info!(driver = name, "Registered database driver");
        drivers.insert(name.to_string(), driver);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Driver>, DomainError> {
        let drivers = self
            .drivers
            .read()
            .map_err(|_| DomainError::internal("Driver registry lock poisoned"))?;

        drivers.get(name).cloned().ok_or_else(|| {
            DomainError::configuration(format!("Unknown database driver '{}'", name))
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.drivers
            .read()
            .map(|drivers| drivers.contains_key(name))
            .unwrap_or(false)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .drivers
            .read()
            .map(|drivers| drivers.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Creates a database handle over the driver registered as `name`
    pub fn open(
        &self,
        name: &str,
        dsn: &str,
        options: PoolOptions,
    ) -> Result<Database, DomainError> {
        Database::new(self.get(name)?, dsn, options)
    }
}

/// Registers the query-logging PostgreSQL driver under `name`
pub fn register_query_log_driver(
    registry: &DriverRegistry,
    name: &str,
    logger: QueryLogger,
) -> Result<(), DomainError> {
    registry.register(
        name,
        Arc::new(InstrumentedDriver::new(Arc::new(PgDriver::new()), logger)),
    )
}

/// Registers the plain and query-logging PostgreSQL drivers under their
/// default names, skipping names that are already taken
pub fn register_default_drivers(
    registry: &DriverRegistry,
    logger: QueryLogger,
) -> Result<(), DomainError> {
    if !registry.contains(POSTGRES_DRIVER) {
        registry.register(POSTGRES_DRIVER, Arc::new(PgDriver::new()))?;
    }

    if !registry.contains(QUERY_LOG_DRIVER) {
        register_query_log_driver(registry, QUERY_LOG_DRIVER, logger)?;
    }

    Ok(())
}
