//! # Records
//!
//! The flat key-value wire format shared by every entity and every store.
//! Timestamps are kept as a native variant rather than strings, and absent
//! optionals are written as an explicit `Null`.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ContentError, Result};

/// One stored document: field name to value.
pub type Record = BTreeMap<String, RecordValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Array(Vec<RecordValue>),
    Map(Record),
}

impl RecordValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the variant, used in decoding errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Timestamp(_) => "timestamp",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }
}

impl From<&str> for RecordValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for RecordValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for RecordValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for RecordValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u64> for RecordValue {
    fn from(value: u64) -> Self {
        Self::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for RecordValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<DateTime<Utc>> for RecordValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<Record> for RecordValue {
    fn from(value: Record) -> Self {
        Self::Map(value)
    }
}

impl From<&[String]> for RecordValue {
    fn from(values: &[String]) -> Self {
        Self::Array(values.iter().cloned().map(Self::String).collect())
    }
}

impl<T: Into<RecordValue>> From<Option<T>> for RecordValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Conversion between an entity and its stored record.
///
/// `from_record` is strict: a missing or mistyped required field is an
/// `InvalidData` error, never a default.
pub trait Document: Sized + Send + Sync + 'static {
    /// Human name used in `InvalidData` errors.
    const ENTITY: &'static str;

    fn id(&self) -> &str;

    /// The collection this particular value is stored in.
    fn collection(&self) -> &'static str;

    fn to_record(&self) -> Record;

    fn from_record(record: &Record) -> Result<Self>;
}

/// Typed, error-reporting field access over a borrowed record.
pub struct RecordReader<'a> {
    record: &'a Record,
    entity: &'static str,
}

impl<'a> RecordReader<'a> {
    pub fn new(record: &'a Record, entity: &'static str) -> Self {
        Self { record, entity }
    }

    fn missing(&self, key: &str) -> ContentError {
        ContentError::invalid(self.entity, format!("missing field `{key}`"))
    }

    fn mistyped(&self, key: &str, expected: &str, found: &RecordValue) -> ContentError {
        ContentError::invalid(
            self.entity,
            format!(
                "field `{key}` should be {expected}, found {}",
                found.type_name()
            ),
        )
    }

    /// Present and non-null, or an error.
    fn required(&self, key: &str) -> Result<&'a RecordValue> {
        match self.record.get(key) {
            None | Some(RecordValue::Null) => Err(self.missing(key)),
            Some(value) => Ok(value),
        }
    }

    /// Absent and null both read as `None`.
    fn optional(&self, key: &str) -> Option<&'a RecordValue> {
        self.record.get(key).filter(|value| !value.is_null())
    }

    pub fn string(&self, key: &str) -> Result<String> {
        match self.required(key)? {
            RecordValue::String(s) => Ok(s.clone()),
            other => Err(self.mistyped(key, "a string", other)),
        }
    }

    pub fn opt_string(&self, key: &str) -> Result<Option<String>> {
        match self.optional(key) {
            None => Ok(None),
            Some(RecordValue::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.mistyped(key, "a string", other)),
        }
    }

    /// A non-negative integer counter.
    pub fn count(&self, key: &str) -> Result<u64> {
        match self.required(key)? {
            RecordValue::Integer(n) => u64::try_from(*n).map_err(|_| {
                ContentError::invalid(self.entity, format!("field `{key}` is negative ({n})"))
            }),
            other => Err(self.mistyped(key, "an integer", other)),
        }
    }

    pub fn opt_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.optional(key) {
            None => Ok(None),
            Some(RecordValue::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(self.mistyped(key, "a bool", other)),
        }
    }

    pub fn opt_double(&self, key: &str) -> Result<Option<f64>> {
        match self.optional(key) {
            None => Ok(None),
            Some(RecordValue::Double(d)) => Ok(Some(*d)),
            // Integral durations come back as integers from some backends.
            Some(RecordValue::Integer(n)) => Ok(Some(*n as f64)),
            Some(other) => Err(self.mistyped(key, "a number", other)),
        }
    }

    pub fn timestamp(&self, key: &str) -> Result<DateTime<Utc>> {
        match self.required(key)? {
            RecordValue::Timestamp(ts) => Ok(*ts),
            other => Err(self.mistyped(key, "a timestamp", other)),
        }
    }

    pub fn opt_timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        match self.optional(key) {
            None => Ok(None),
            Some(RecordValue::Timestamp(ts)) => Ok(Some(*ts)),
            Some(other) => Err(self.mistyped(key, "a timestamp", other)),
        }
    }

    /// A string-valued enum, parsed through its `FromStr`.
    pub fn parsed<T: FromStr>(&self, key: &str) -> Result<T> {
        let raw = self.string(key)?;
        raw.parse().map_err(|_| {
            ContentError::invalid(self.entity, format!("unrecognized `{key}` value {raw:?}"))
        })
    }

    pub fn strings(&self, key: &str) -> Result<Vec<String>> {
        self.array(key)?
            .iter()
            .map(|item| match item {
                RecordValue::String(s) => Ok(s.clone()),
                other => Err(self.mistyped(key, "an array of strings", other)),
            })
            .collect()
    }

    /// Array of nested records, each decoded with `T::from_record`.
    pub fn documents<T: Document>(&self, key: &str) -> Result<Vec<T>> {
        decode_documents(self.array(key)?)
    }

    /// Like `documents`, but an absent or null field is an empty list.
    pub fn opt_documents<T: Document>(&self, key: &str) -> Result<Vec<T>> {
        match self.optional(key) {
            None => Ok(Vec::new()),
            Some(RecordValue::Array(items)) => decode_documents(items),
            Some(other) => Err(self.mistyped(key, "an array", other)),
        }
    }

    fn array(&self, key: &str) -> Result<&'a [RecordValue]> {
        match self.required(key)? {
            RecordValue::Array(items) => Ok(items),
            other => Err(self.mistyped(key, "an array", other)),
        }
    }
}

/// Decodes an array of nested records; the first failure wins.
pub fn decode_documents<T: Document>(items: &[RecordValue]) -> Result<Vec<T>> {
    items
        .iter()
        .map(|item| match item {
            RecordValue::Map(record) => T::from_record(record),
            other => Err(ContentError::invalid(
                T::ENTITY,
                format!("nested entry should be a map, found {}", other.type_name()),
            )),
        })
        .collect()
}

/// Encodes entities as an array of nested records.
pub fn encode_documents<T: Document>(items: &[T]) -> RecordValue {
    RecordValue::Array(items.iter().map(|d| d.to_record().into()).collect())
}
