//! Marketplace cache
//!
//! Read-through caching repositories for the marketplace backend:
//! - Per-entity repositories layered request memo, shared cache, database
//! - One versioned cache payload format per deployment
//! - Cooldown gate for user bumps
//! - Query-logging SQL driver decorator

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use tracing::info;

use config::RateGateConfig;
use domain::cache::CacheClient;
use domain::codec::Codec;
use domain::entity::{Item, Shipping, TransactionEvidence, User};
use domain::repository::{
    ConfigRepository, ItemRepository, RateGate, ShippingRepository,
    TransactionEvidenceRepository, UserRepository,
};
use domain::DomainError;
use infrastructure::cache::CacheFactory;
use infrastructure::sql::{Database, DriverRegistry, register_default_drivers};
use infrastructure::store::{SqlConfigStore, SqlRecordStore};

/// Every caching repository, wired to one database handle and one cache
#[derive(Debug)]
pub struct Repositories {
    pub items: ItemRepository,
    pub users: UserRepository,
    pub shippings: ShippingRepository,
    pub transaction_evidences: TransactionEvidenceRepository,
    pub configs: ConfigRepository,
    database: Arc<Database>,
}

impl Repositories {
    pub fn new(
        database: Arc<Database>,
        cache: Arc<dyn CacheClient>,
        codec: Codec,
        rate_gate: &RateGateConfig,
    ) -> Self {
        let bumps = RateGate::new(cache.clone(), rate_gate.namespace.clone(), rate_gate.cooldown());

        Self {
            items: ItemRepository::new(
                Arc::new(SqlRecordStore::<Item>::new(database.clone())),
                cache.clone(),
                codec,
            ),
            users: UserRepository::new(
                Arc::new(SqlRecordStore::<User>::new(database.clone())),
                cache.clone(),
                codec,
                bumps,
            ),
            shippings: ShippingRepository::new(
                Arc::new(SqlRecordStore::<Shipping>::new(database.clone())),
                cache.clone(),
                codec,
            ),
            transaction_evidences: TransactionEvidenceRepository::new(
                Arc::new(SqlRecordStore::<TransactionEvidence>::new(database.clone())),
                cache,
                codec,
            ),
            configs: ConfigRepository::new(Arc::new(SqlConfigStore::new(database.clone()))),
            database,
        }
    }

    /// Builds the cache client and database handle described by `config`
    ///
    /// The default drivers are registered in `registry` first if missing.
    pub async fn from_config(
        config: &AppConfig,
        registry: &DriverRegistry,
    ) -> Result<Self, DomainError> {
        config.rate_gate.validate()?;
        register_default_drivers(registry, config.query_log.logger())?;

        let cache = CacheFactory::new()
            .create(&config.cache.to_cache_config())
            .await?;

        let database = Arc::new(registry.open(
            &config.database.driver,
            &config.database.url,
            config.database.pool_options(),
        )?);

        info!(
            driver = %config.database.driver,
            codec = %config.codec,
            "Repositories ready"
        );

        Ok(Self::new(database, cache, config.codec, &config.rate_gate))
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    /// Drops every shared cache entry and the local config memo
    pub async fn flush(&self) -> Result<(), DomainError> {
        self.items.flush().await?;
        self.configs.flush();
        Ok(())
    }
}
