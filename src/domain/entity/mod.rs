//! Cached marketplace entities
//!
//! Each entity mirrors a database row and declares everything the generic
//! cache repository needs: its key namespace, the table and key column it is
//! loaded from, the row mapping, and its compact wire schema.

mod item;
mod shipping;
mod timestamp;
mod transaction_evidence;
mod user;

use std::fmt::{Debug, Display};
use std::hash::Hash;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::DomainError;
use crate::domain::sql::{Row, SqlValue};

pub use item::{Item, ItemSchema};
pub use shipping::{Shipping, ShippingSchema};
pub use timestamp::WireTimestamp;
pub use transaction_evidence::{TransactionEvidence, TransactionEvidenceSchema};
pub use user::{User, UserSchema};

/// A database-backed record that can live in the cache
pub trait Entity:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Lookup identifier, also the cache key suffix
    type Id: Copy + Eq + Hash + Debug + Display + Into<SqlValue> + Send + Sync + 'static;

    /// Hand-declared compact payload
    type Schema: prost::Message + Default;

    /// Cache key namespace, lowercase entity name
    const NAMESPACE: &'static str;

    const TABLE: &'static str;

    /// Column the identifier is matched against
    const KEY_COLUMN: &'static str;

    fn id(&self) -> Self::Id;

    fn from_row(row: &Row) -> Result<Self, DomainError>;

    fn to_schema(&self) -> Self::Schema;

    fn from_schema(schema: Self::Schema) -> Self;
}
