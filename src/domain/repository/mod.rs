//! Caching repositories

mod cache_repository;
mod config;
mod memo;
mod rate_gate;
mod record_store;
mod user;

pub use cache_repository::CacheRepository;
pub use config::{ConfigRepository, ConfigStore};
pub use memo::RequestMemo;
pub use rate_gate::RateGate;
pub use record_store::RecordStore;
pub use user::{DEFAULT_BUMP_COOLDOWN, DEFAULT_BUMP_NAMESPACE, UserRepository};

use crate::domain::entity::{Item, Shipping, TransactionEvidence};

pub type ItemRepository = CacheRepository<Item>;
pub type ShippingRepository = CacheRepository<Shipping>;
pub type TransactionEvidenceRepository = CacheRepository<TransactionEvidence>;

#[cfg(test)]
pub use config::mock::MockConfigStore;
#[cfg(test)]
pub use record_store::mock::MockRecordStore;
