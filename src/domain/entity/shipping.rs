use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Entity;
use super::timestamp::{WireTimestamp, from_wire, to_wire};
use crate::domain::DomainError;
use crate::domain::sql::Row;

/// Shipment attached to a transaction evidence, keyed by that evidence's id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipping {
    pub transaction_evidence_id: i64,
    pub status: String,
    pub item_name: String,
    pub item_id: i64,
    pub reserve_id: String,
    pub reserve_time: i64,
    pub to_address: String,
    pub to_name: String,
    pub from_address: String,
    pub from_name: String,
    pub img_binary: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ShippingSchema {
    #[prost(int64, tag = "1")]
    pub transaction_evidence_id: i64,
    #[prost(string, tag = "2")]
    pub status: String,
    #[prost(string, tag = "3")]
    pub item_name: String,
    #[prost(int64, tag = "4")]
    pub item_id: i64,
    #[prost(string, tag = "5")]
    pub reserve_id: String,
    #[prost(int64, tag = "6")]
    pub reserve_time: i64,
    #[prost(string, tag = "7")]
    pub to_address: String,
    #[prost(string, tag = "8")]
    pub to_name: String,
    #[prost(string, tag = "9")]
    pub from_address: String,
    #[prost(string, tag = "10")]
    pub from_name: String,
    #[prost(bytes = "vec", tag = "11")]
    pub img_binary: Vec<u8>,
    #[prost(message, optional, tag = "12")]
    pub created_at: Option<WireTimestamp>,
    #[prost(message, optional, tag = "13")]
    pub updated_at: Option<WireTimestamp>,
}

impl Entity for Shipping {
    type Id = i64;
    type Schema = ShippingSchema;

    const NAMESPACE: &'static str = "shipping";
    const TABLE: &'static str = "shippings";
    const KEY_COLUMN: &'static str = "transaction_evidence_id";

    fn id(&self) -> i64 {
        self.transaction_evidence_id
    }

    fn from_row(row: &Row) -> Result<Self, DomainError> {
        Ok(Self {
            transaction_evidence_id: row.get_i64("transaction_evidence_id")?,
            status: row.get_string("status")?,
            item_name: row.get_string("item_name")?,
            item_id: row.get_i64("item_id")?,
            reserve_id: row.get_string("reserve_id")?,
            reserve_time: row.get_i64("reserve_time")?,
            to_address: row.get_string("to_address")?,
            to_name: row.get_string("to_name")?,
            from_address: row.get_string("from_address")?,
            from_name: row.get_string("from_name")?,
            img_binary: row.get_bytes("img_binary")?,
            created_at: row.get_timestamp("created_at")?,
            updated_at: row.get_timestamp("updated_at")?,
        })
    }

    fn to_schema(&self) -> ShippingSchema {
        ShippingSchema {
            transaction_evidence_id: self.transaction_evidence_id,
            status: self.status.clone(),
            item_name: self.item_name.clone(),
            item_id: self.item_id,
            reserve_id: self.reserve_id.clone(),
            reserve_time: self.reserve_time,
            to_address: self.to_address.clone(),
            to_name: self.to_name.clone(),
            from_address: self.from_address.clone(),
            from_name: self.from_name.clone(),
            img_binary: self.img_binary.clone(),
            created_at: to_wire(&self.created_at),
            updated_at: to_wire(&self.updated_at),
        }
    }

    fn from_schema(schema: ShippingSchema) -> Self {
        Self {
            transaction_evidence_id: schema.transaction_evidence_id,
            status: schema.status,
            item_name: schema.item_name,
            item_id: schema.item_id,
            reserve_id: schema.reserve_id,
            reserve_time: schema.reserve_time,
            to_address: schema.to_address,
            to_name: schema.to_name,
            from_address: schema.from_address,
            from_name: schema.from_name,
            img_binary: schema.img_binary,
            created_at: from_wire(schema.created_at),
            updated_at: from_wire(schema.updated_at),
        }
    }
}
