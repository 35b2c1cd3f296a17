//! Tagged column values.
//!
//! Rows read from the database are decoded into [`SqlValue`] first and only
//! then converted to JSON, so every type decision is made in one place instead
//! of relying on implicit coercion.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value as JsonValue};

/// A single decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Exact numeric, kept as its decimal text to avoid precision loss.
    Decimal(String),
    Text(String),
    /// Timestamp with time zone, normalized to UTC.
    Timestamp(DateTime<Utc>),
    /// Timestamp without time zone.
    LocalTimestamp(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Json(JsonValue),
    Bytes(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Name of the variant, for logs and diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "text",
            Self::Timestamp(_) => "timestamp",
            Self::LocalTimestamp(_) => "local_timestamp",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::Json(_) => "json",
            Self::Bytes(_) => "bytes",
        }
    }

    /// Convert to the JSON representation used on the wire.
    ///
    /// Decimals stay strings, temporal values use ISO-8601, bytes are base64
    /// and non-finite floats (NaN, ±Infinity) become strings since JSON has no
    /// literal for them.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(i) => JsonValue::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(f.to_string())),
            Self::Decimal(s) | Self::Text(s) => JsonValue::String(s.clone()),
            Self::Timestamp(ts) => {
                JsonValue::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Self::LocalTimestamp(ts) => {
                JsonValue::String(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
            Self::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
            Self::Time(t) => JsonValue::String(t.format("%H:%M:%S%.f").to_string()),
            Self::Json(v) => v.clone(),
            Self::Bytes(b) => JsonValue::String(STANDARD.encode(b)),
        }
    }
}

impl From<SqlValue> for JsonValue {
    fn from(value: SqlValue) -> Self {
        match value {
            SqlValue::Decimal(s) | SqlValue::Text(s) => JsonValue::String(s),
            SqlValue::Json(v) => v,
            other => other.to_json(),
        }
    }
}

impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// One result row: column names mapped to values, in result-set order.
///
/// Duplicate column names (e.g. `SELECT a.id, b.id`) are kept as separate
/// entries; [`Record::into_json`] suffixes later duplicates so none is lost.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(Vec<(String, SqlValue)>);

impl Record {
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub fn push(&mut self, column: impl Into<String>, value: SqlValue) {
        self.0.push((column.into(), value));
    }

    /// First value for `column`, if present.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.0.iter().find(|(name, _)| name == column).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.0.iter().map(|(name, v)| (name.as_str(), v))
    }

    /// Convert to an ordered JSON object.
    pub fn into_json(self) -> Map<String, JsonValue> {
        let mut map = Map::with_capacity(self.0.len());
        for (name, value) in self.0 {
            let key = unique_key(&map, name);
            map.insert(key, value.into());
        }
        map
    }
}

fn unique_key(map: &Map<String, JsonValue>, name: String) -> String {
    if !map.contains_key(&name) {
        return name;
    }
    (2..)
        .map(|n| format!("{}_{}", name, n))
        .find(|candidate| !map.contains_key(candidate))
        .unwrap_or(name)
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
