use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Entity;
use super::timestamp::{WireTimestamp, from_wire, to_wire};
use crate::domain::DomainError;
use crate::domain::sql::Row;

/// Marketplace account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub account_name: String,
    pub hashed_password: Vec<u8>,
    pub address: String,
    pub num_sell_items: i32,
    pub last_bump: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UserSchema {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(string, tag = "2")]
    pub account_name: String,
    #[prost(bytes = "vec", tag = "3")]
    pub hashed_password: Vec<u8>,
    #[prost(string, tag = "4")]
    pub address: String,
    #[prost(int32, tag = "5")]
    pub num_sell_items: i32,
    #[prost(message, optional, tag = "6")]
    pub last_bump: Option<WireTimestamp>,
    #[prost(message, optional, tag = "7")]
    pub created_at: Option<WireTimestamp>,
}

impl Entity for User {
    type Id = i64;
    type Schema = UserSchema;

    const NAMESPACE: &'static str = "user";
    const TABLE: &'static str = "users";
    const KEY_COLUMN: &'static str = "id";

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &Row) -> Result<Self, DomainError> {
        Ok(Self {
            id: row.get_i64("id")?,
            account_name: row.get_string("account_name")?,
            hashed_password: row.get_bytes("hashed_password")?,
            address: row.get_string("address")?,
            num_sell_items: row.get_i32("num_sell_items")?,
            last_bump: row.get_timestamp("last_bump")?,
            created_at: row.get_timestamp("created_at")?,
        })
    }

    fn to_schema(&self) -> UserSchema {
        UserSchema {
            id: self.id,
            account_name: self.account_name.clone(),
            hashed_password: self.hashed_password.clone(),
            address: self.address.clone(),
            num_sell_items: self.num_sell_items,
            last_bump: to_wire(&self.last_bump),
            created_at: to_wire(&self.created_at),
        }
    }

    fn from_schema(schema: UserSchema) -> Self {
        Self {
            id: schema.id,
            account_name: schema.account_name,
            hashed_password: schema.hashed_password,
            address: schema.address,
            num_sell_items: schema.num_sell_items,
            last_bump: from_wire(schema.last_bump),
            created_at: from_wire(schema.created_at),
        }
    }
}
