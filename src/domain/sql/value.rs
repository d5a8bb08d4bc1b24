//! Dynamic SQL values and rows exchanged across the driver protocol

use chrono::{DateTime, Utc};

use crate::domain::DomainError;

/// A single bound argument or column value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Timestamp(_) => "timestamp",
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

/// Outcome of a statement that does not return rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
}

/// One result row, columns kept in select order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        self.columns.push((column.into(), value.into()));
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    fn require(&self, column: &str) -> Result<&SqlValue, DomainError> {
        self.get(column)
            .ok_or_else(|| DomainError::storage(format!("Column '{}' missing from row", column)))
    }

    fn mismatch(column: &str, expected: &str, found: &SqlValue) -> DomainError {
        DomainError::storage(format!(
            "Column '{}' expected {}, found {}",
            column,
            expected,
            found.kind()
        ))
    }

    pub fn get_i64(&self, column: &str) -> Result<i64, DomainError> {
        match self.require(column)? {
            SqlValue::Int(v) => Ok(*v),
            other => Err(Self::mismatch(column, "int", other)),
        }
    }

    pub fn get_i32(&self, column: &str) -> Result<i32, DomainError> {
        let value = self.get_i64(column)?;
        i32::try_from(value).map_err(|_| {
            DomainError::storage(format!("Column '{}' value {} overflows i32", column, value))
        })
    }

    pub fn get_string(&self, column: &str) -> Result<String, DomainError> {
        match self.require(column)? {
            SqlValue::Text(v) => Ok(v.clone()),
            other => Err(Self::mismatch(column, "text", other)),
        }
    }

    pub fn get_bytes(&self, column: &str) -> Result<Vec<u8>, DomainError> {
        match self.require(column)? {
            SqlValue::Bytes(v) => Ok(v.clone()),
            SqlValue::Text(v) => Ok(v.as_bytes().to_vec()),
            SqlValue::Null => Ok(Vec::new()),
            other => Err(Self::mismatch(column, "bytes", other)),
        }
    }

    pub fn get_timestamp(&self, column: &str) -> Result<DateTime<Utc>, DomainError> {
        match self.require(column)? {
            SqlValue::Timestamp(v) => Ok(*v),
            other => Err(Self::mismatch(column, "timestamp", other)),
        }
    }
}
