//! Cache payload encoding
//!
//! Every payload starts with a one-byte format tag followed by the body.
//! Exactly one format is active per deployment; a repository refuses to
//! decode payloads carrying the other tag instead of misreading them.

mod buffer;

use prost::Message;
use serde::Deserialize;

use crate::domain::DomainError;
use crate::domain::entity::Entity;

pub use buffer::{BufferPool, PooledBuffer};

const GENERIC_TAG: u8 = 0x01;
const COMPACT_TAG: u8 = 0x02;

/// Payload format used for entity cache entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    /// Self-describing serde encoding of the whole struct
    Generic,
    /// Hand-declared protobuf schema with numbered fields
    #[default]
    Compact,
}

impl Codec {
    pub fn tag(self) -> u8 {
        match self {
            Self::Generic => GENERIC_TAG,
            Self::Compact => COMPACT_TAG,
        }
    }

    fn name_of(tag: u8) -> &'static str {
        match tag {
            GENERIC_TAG => "generic",
            COMPACT_TAG => "compact",
            _ => "unknown",
        }
    }

    /// Appends the tagged payload for `entity` to `buf`
    pub fn encode_into<T: Entity>(self, entity: &T, buf: &mut Vec<u8>) -> Result<(), DomainError> {
        buf.push(self.tag());

        match self {
            Self::Generic => serde_json::to_writer(&mut *buf, entity).map_err(|e| {
                DomainError::encoding(format!("Failed to encode {}: {}", T::NAMESPACE, e))
            }),
            Self::Compact => entity.to_schema().encode(buf).map_err(|e| {
                DomainError::encoding(format!("Failed to encode {}: {}", T::NAMESPACE, e))
            }),
        }
    }

    pub fn encode<T: Entity>(self, entity: &T) -> Result<Vec<u8>, DomainError> {
        let mut buf = Vec::new();
        self.encode_into(entity, &mut buf)?;
        Ok(buf)
    }

    pub fn decode<T: Entity>(self, payload: &[u8]) -> Result<T, DomainError> {
        let (&tag, body) = payload.split_first().ok_or_else(|| {
            DomainError::encoding(format!("Empty {} payload", T::NAMESPACE))
        })?;

        if tag != self.tag() {
            return Err(DomainError::encoding(format!(
                "{} payload uses the {} format, expected {}",
                T::NAMESPACE,
                Self::name_of(tag),
                Self::name_of(self.tag())
            )));
        }

        match self {
            Self::Generic => serde_json::from_slice(body).map_err(|e| {
                DomainError::encoding(format!("Failed to decode {}: {}", T::NAMESPACE, e))
            }),
            Self::Compact => T::Schema::decode(body).map(T::from_schema).map_err(|e| {
                DomainError::encoding(format!("Failed to decode {}: {}", T::NAMESPACE, e))
            }),
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(Self::name_of(self.tag()))
    }
}

impl std::str::FromStr for Codec {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "generic" => Ok(Self::Generic),
            "compact" => Ok(Self::Compact),
            _ => Err(DomainError::configuration(format!(
                "Unknown codec: {}. Valid codecs: generic, compact",
                s
            ))),
        }
    }
}
