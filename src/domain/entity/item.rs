use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Entity;
use super::timestamp::{WireTimestamp, from_wire, to_wire};
use crate::domain::DomainError;
use crate::domain::sql::Row;

/// Listed item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub seller_id: i64,
    pub buyer_id: i64,
    pub status: String,
    pub name: String,
    pub price: i32,
    pub description: String,
    pub image_name: String,
    pub category_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ItemSchema {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(int64, tag = "2")]
    pub seller_id: i64,
    #[prost(int64, tag = "3")]
    pub buyer_id: i64,
    #[prost(string, tag = "4")]
    pub status: String,
    #[prost(string, tag = "5")]
    pub name: String,
    #[prost(int32, tag = "6")]
    pub price: i32,
    #[prost(string, tag = "7")]
    pub description: String,
    #[prost(string, tag = "8")]
    pub image_name: String,
    #[prost(int32, tag = "9")]
    pub category_id: i32,
    #[prost(message, optional, tag = "10")]
    pub created_at: Option<WireTimestamp>,
    #[prost(message, optional, tag = "11")]
    pub updated_at: Option<WireTimestamp>,
}

impl Entity for Item {
    type Id = i64;
    type Schema = ItemSchema;

    const NAMESPACE: &'static str = "item";
    const TABLE: &'static str = "items";
    const KEY_COLUMN: &'static str = "id";

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &Row) -> Result<Self, DomainError> {
        Ok(Self {
            id: row.get_i64("id")?,
            seller_id: row.get_i64("seller_id")?,
            buyer_id: row.get_i64("buyer_id")?,
            status: row.get_string("status")?,
            name: row.get_string("name")?,
            price: row.get_i32("price")?,
            description: row.get_string("description")?,
            image_name: row.get_string("image_name")?,
            category_id: row.get_i32("category_id")?,
            created_at: row.get_timestamp("created_at")?,
            updated_at: row.get_timestamp("updated_at")?,
        })
    }

    fn to_schema(&self) -> ItemSchema {
        ItemSchema {
            id: self.id,
            seller_id: self.seller_id,
            buyer_id: self.buyer_id,
            status: self.status.clone(),
            name: self.name.clone(),
            price: self.price,
            description: self.description.clone(),
            image_name: self.image_name.clone(),
            category_id: self.category_id,
            created_at: to_wire(&self.created_at),
            updated_at: to_wire(&self.updated_at),
        }
    }

    fn from_schema(schema: ItemSchema) -> Self {
        Self {
            id: schema.id,
            seller_id: schema.seller_id,
            buyer_id: schema.buyer_id,
            status: schema.status,
            name: schema.name,
            price: schema.price,
            description: schema.description,
            image_name: schema.image_name,
            category_id: schema.category_id,
            created_at: from_wire(schema.created_at),
            updated_at: from_wire(schema.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::fixtures;

    #[test]
    fn test_item_from_row() {
        let row = Row::new()
            .with("id", 10i64)
            .with("seller_id", 2i64)
            .with("buyer_id", 0i64)
            .with("status", "on_sale")
            .with("name", "item 10")
            .with("price", 1000)
            .with("description", "barely used")
            .with("image_name", "10.jpg")
            .with("category_id", 32)
            .with("created_at", fixtures::at(1_500_000_000))
            .with("updated_at", fixtures::at(1_500_000_100));

        assert_eq!(Item::from_row(&row).unwrap(), fixtures::item(10, 2));
    }

    #[test]
    fn test_item_from_row_rejects_wrong_types() {
        let row = Row::new().with("id", "ten");
        assert!(Item::from_row(&row).is_err());
    }
}
