//! Domain layer - entities, contracts and caching logic

pub mod cache;
pub mod codec;
pub mod entity;
pub mod error;
pub mod repository;
pub mod sql;

pub use cache::{CacheClient, KeySpace};
pub use codec::Codec;
pub use entity::{Entity, Item, Shipping, TransactionEvidence, User};
pub use error::DomainError;
pub use repository::{
    CacheRepository, ConfigRepository, ConfigStore, ItemRepository, RateGate, RecordStore,
    RequestMemo, ShippingRepository, TransactionEvidenceRepository, UserRepository,
};
