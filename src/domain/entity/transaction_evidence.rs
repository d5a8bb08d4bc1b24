use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Entity;
use super::timestamp::{WireTimestamp, from_wire, to_wire};
use crate::domain::DomainError;
use crate::domain::sql::Row;

/// Record of a purchase; one per item, so it is looked up and cached by
/// `item_id` rather than by its own `id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEvidence {
    pub id: i64,
    pub seller_id: i64,
    pub buyer_id: i64,
    pub status: String,
    pub item_id: i64,
    pub item_name: String,
    pub item_price: i32,
    pub item_description: String,
    pub item_category_id: i32,
    pub item_root_category_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TransactionEvidenceSchema {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(int64, tag = "2")]
    pub seller_id: i64,
    #[prost(int64, tag = "3")]
    pub buyer_id: i64,
    #[prost(string, tag = "4")]
    pub status: String,
    #[prost(int64, tag = "5")]
    pub item_id: i64,
    #[prost(string, tag = "6")]
    pub item_name: String,
    #[prost(int32, tag = "7")]
    pub item_price: i32,
    #[prost(string, tag = "8")]
    pub item_description: String,
    #[prost(int32, tag = "9")]
    pub item_category_id: i32,
    #[prost(int32, tag = "10")]
    pub item_root_category_id: i32,
    #[prost(message, optional, tag = "11")]
    pub created_at: Option<WireTimestamp>,
    #[prost(message, optional, tag = "12")]
    pub updated_at: Option<WireTimestamp>,
}

impl Entity for TransactionEvidence {
    type Id = i64;
    type Schema = TransactionEvidenceSchema;

    const NAMESPACE: &'static str = "transaction_evidence";
    const TABLE: &'static str = "transaction_evidences";
    const KEY_COLUMN: &'static str = "item_id";

    fn id(&self) -> i64 {
        self.item_id
    }

    fn from_row(row: &Row) -> Result<Self, DomainError> {
        Ok(Self {
            id: row.get_i64("id")?,
            seller_id: row.get_i64("seller_id")?,
            buyer_id: row.get_i64("buyer_id")?,
            status: row.get_string("status")?,
            item_id: row.get_i64("item_id")?,
            item_name: row.get_string("item_name")?,
            item_price: row.get_i32("item_price")?,
            item_description: row.get_string("item_description")?,
            item_category_id: row.get_i32("item_category_id")?,
            item_root_category_id: row.get_i32("item_root_category_id")?,
            created_at: row.get_timestamp("created_at")?,
            updated_at: row.get_timestamp("updated_at")?,
        })
    }

    fn to_schema(&self) -> TransactionEvidenceSchema {
        TransactionEvidenceSchema {
            id: self.id,
            seller_id: self.seller_id,
            buyer_id: self.buyer_id,
            status: self.status.clone(),
            item_id: self.item_id,
            item_name: self.item_name.clone(),
            item_price: self.item_price,
            item_description: self.item_description.clone(),
            item_category_id: self.item_category_id,
            item_root_category_id: self.item_root_category_id,
            created_at: to_wire(&self.created_at),
            updated_at: to_wire(&self.updated_at),
        }
    }

    fn from_schema(schema: TransactionEvidenceSchema) -> Self {
        Self {
            id: schema.id,
            seller_id: schema.seller_id,
            buyer_id: schema.buyer_id,
            status: schema.status,
            item_id: schema.item_id,
            item_name: schema.item_name,
            item_price: schema.item_price,
            item_description: schema.item_description,
            item_category_id: schema.item_category_id,
            item_root_category_id: schema.item_root_category_id,
            created_at: from_wire(schema.created_at),
            updated_at: from_wire(schema.updated_at),
        }
    }
}
