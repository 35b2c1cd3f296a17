//! Database-agnostic type mappings.
//!
//! Rows are decoded into [`Record`]s of tagged [`SqlValue`]s.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction
//!
//! PostgreSQL is decoded by declared column type. SQLite is decoded by the
//! storage class of each value, since its declared types are only affinities.

use crate::models::{DatabaseType, Record, SqlValue};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueFormat, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    TimestampTz,
    Timestamp,
    Date,
    Time,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is an affinity, not an exact type
        if db == DatabaseType::SQLite {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    // Arrays, ranges and geometric types are not decoded
    if lower.ends_with("[]") || lower.starts_with('_') || lower.contains("range") {
        return TypeCategory::Unknown;
    }

    match lower.as_str() {
        "bool" | "boolean" => return TypeCategory::Boolean,
        "timestamptz" | "timestamp with time zone" => return TypeCategory::TimestampTz,
        "timestamp" | "timestamp without time zone" | "datetime" => {
            return TypeCategory::Timestamp;
        }
        "date" => return TypeCategory::Date,
        "time" | "time without time zone" => return TypeCategory::Time,
        "json" | "jsonb" => return TypeCategory::Json,
        "uuid" => return TypeCategory::Uuid,
        "bytea" => return TypeCategory::Binary,
        "interval" | "point" | "line" | "lseg" | "box" | "path" | "polygon" | "circle" => {
            return TypeCategory::Unknown;
        }
        "text" | "varchar" | "char" | "bpchar" | "name" | "citext" | "character varying" => {
            return TypeCategory::Text;
        }
        _ => {}
    }

    // Integer types
    if lower.contains("int") || lower.contains("serial") || lower == "oid" {
        return TypeCategory::Integer;
    }

    // Float types
    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    // Binary types
    if lower.contains("blob") || lower.contains("binary") {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower.contains("text") || lower.contains("clob") {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Exact NUMERIC value rendered as decimal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDecimal(pub String);

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("NUMERIC")
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        match value.format() {
            PgValueFormat::Binary => Ok(RawDecimal(numeric_to_string(value.as_bytes()?)?)),
            PgValueFormat::Text => Ok(RawDecimal(value.as_str()?.to_string())),
        }
    }
}

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Render the binary wire form of a PostgreSQL NUMERIC.
///
/// Layout: `ndigits: i16, weight: i16, sign: u16, dscale: u16`, then
/// `ndigits` base-10000 digits. `weight` is the power of 10000 of the first
/// digit and `dscale` the number of decimal places to print.
pub fn numeric_to_string(bytes: &[u8]) -> Result<String, String> {
    if bytes.len() < 8 {
        return Err(format!("NUMERIC header too short: {} bytes", bytes.len()));
    }
    let read_i16 = |at: usize| i16::from_be_bytes([bytes[at], bytes[at + 1]]);
    let ndigits = read_i16(0);
    let weight = read_i16(2) as i32;
    let sign = u16::from_be_bytes([bytes[4], bytes[5]]);
    let dscale = u16::from_be_bytes([bytes[6], bytes[7]]) as usize;

    if ndigits < 0 || bytes.len() < 8 + ndigits as usize * 2 {
        return Err(format!("NUMERIC has {} digits but {} bytes", ndigits, bytes.len()));
    }
    let digits: Vec<i16> = (0..ndigits as usize).map(|k| read_i16(8 + 2 * k)).collect();
    let digit_at = |idx: i32| -> i16 {
        usize::try_from(idx)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    match sign {
        NUMERIC_POS => {}
        NUMERIC_NEG => out.push('-'),
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        other => return Err(format!("invalid NUMERIC sign 0x{:04x}", other)),
    }

    if weight < 0 {
        out.push('0');
    } else {
        for idx in 0..=weight {
            if idx == 0 {
                out.push_str(&digit_at(idx).to_string());
            } else {
                out.push_str(&format!("{:04}", digit_at(idx)));
            }
        }
    }

    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut idx = weight + 1;
        while fraction.len() < dscale {
            fraction.push_str(&format!("{:04}", digit_at(idx)));
            idx += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }

    Ok(out)
}

// =============================================================================
// Row to Record Trait
// =============================================================================

/// Trait for converting database rows to records.
pub trait RowToRecord {
    fn to_record(&self) -> Record;
}

impl RowToRecord for PgRow {
    fn to_record(&self) -> Record {
        let mut record = Record::with_capacity(self.columns().len());
        for (idx, col) in self.columns().iter().enumerate() {
            let type_name = col.type_info().name();
            let category = categorize_type(type_name, DatabaseType::PostgreSQL);
            record.push(col.name(), postgres::decode_column(self, idx, type_name, category));
        }
        record
    }
}

impl RowToRecord for SqliteRow {
    fn to_record(&self) -> Record {
        let mut record = Record::with_capacity(self.columns().len());
        for (idx, col) in self.columns().iter().enumerate() {
            let declared = col.type_info().name();
            record.push(col.name(), sqlite::decode_column(self, idx, declared));
        }
        record
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod postgres {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    pub fn decode_column(
        row: &PgRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
    ) -> SqlValue {
        let decoded = match category {
            TypeCategory::Decimal => {
                get::<RawDecimal>(row, idx).map(|v| v.map(|d| SqlValue::Decimal(d.0)))
            }
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => get::<bool>(row, idx).map(|v| v.map(SqlValue::Bool)),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => get::<Vec<u8>>(row, idx).map(|v| v.map(SqlValue::Bytes)),
            TypeCategory::Json => get::<serde_json::Value>(row, idx).map(|v| v.map(SqlValue::Json)),
            TypeCategory::Uuid => {
                get::<uuid::Uuid>(row, idx).map(|v| v.map(|u| SqlValue::Text(u.to_string())))
            }
            TypeCategory::TimestampTz => {
                get::<DateTime<Utc>>(row, idx).map(|v| v.map(SqlValue::Timestamp))
            }
            TypeCategory::Timestamp => {
                get::<NaiveDateTime>(row, idx).map(|v| v.map(SqlValue::LocalTimestamp))
            }
            TypeCategory::Date => get::<NaiveDate>(row, idx).map(|v| v.map(SqlValue::Date)),
            TypeCategory::Time => get::<NaiveTime>(row, idx).map(|v| v.map(SqlValue::Time)),
            TypeCategory::Text => get::<String>(row, idx).map(|v| v.map(SqlValue::Text)),
            TypeCategory::Unknown => decode_unknown(row, idx),
        };

        match decoded {
            Ok(Some(value)) => value,
            Ok(None) => SqlValue::Null,
            Err(e) => {
                tracing::warn!(
                    column = idx,
                    type_name = type_name,
                    error = %e,
                    "Unsupported column value, returning NULL (cast it to text in the query)"
                );
                SqlValue::Null
            }
        }
    }

    fn get<'r, T>(row: &'r PgRow, idx: usize) -> Result<Option<T>, sqlx::Error>
    where
        T: Decode<'r, sqlx::Postgres> + Type<sqlx::Postgres>,
    {
        row.try_get::<Option<T>, _>(idx)
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Result<Option<SqlValue>, sqlx::Error> {
        if let Ok(v) = get::<i64>(row, idx) {
            return Ok(v.map(SqlValue::Int));
        }
        if let Ok(v) = get::<i32>(row, idx) {
            return Ok(v.map(|i| SqlValue::Int(i.into())));
        }
        if let Ok(v) = get::<i16>(row, idx) {
            return Ok(v.map(|i| SqlValue::Int(i.into())));
        }
        get::<sqlx::postgres::types::Oid>(row, idx)
            .map(|v| v.map(|oid| SqlValue::Int(oid.0.into())))
    }

    fn decode_float(row: &PgRow, idx: usize) -> Result<Option<SqlValue>, sqlx::Error> {
        if let Ok(v) = get::<f64>(row, idx) {
            return Ok(v.map(SqlValue::Float));
        }
        get::<f32>(row, idx).map(|v| v.map(|f| SqlValue::Float(f.into())))
    }

    /// Enums and other text-like types carry UTF-8 in both wire formats.
    fn decode_unknown(row: &PgRow, idx: usize) -> Result<Option<SqlValue>, sqlx::Error> {
        row.try_get_unchecked::<Option<String>, _>(idx)
            .map(|v| v.map(SqlValue::Text))
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize, declared: &str) -> SqlValue {
        let storage = match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => return SqlValue::Null,
            Ok(raw) => raw.type_info().name().to_uppercase(),
            Err(e) => {
                tracing::warn!(column = idx, error = %e, "Failed to read SQLite value");
                return SqlValue::Null;
            }
        };
        let category = categorize_type(declared, DatabaseType::SQLite);

        let decoded = match storage.as_str() {
            "INTEGER" if category == TypeCategory::Boolean => row
                .try_get_unchecked::<i64, _>(idx)
                .map(|v| SqlValue::Bool(v != 0)),
            "INTEGER" => row.try_get_unchecked::<i64, _>(idx).map(SqlValue::Int),
            "REAL" => row.try_get_unchecked::<f64, _>(idx).map(SqlValue::Float),
            "BLOB" => row.try_get_unchecked::<Vec<u8>, _>(idx).map(SqlValue::Bytes),
            _ => row.try_get_unchecked::<String, _>(idx).map(|s| {
                if category == TypeCategory::Json {
                    serde_json::from_str(&s)
                        .map(SqlValue::Json)
                        .unwrap_or(SqlValue::Text(s))
                } else {
                    SqlValue::Text(s)
                }
            }),
        };

        decoded.unwrap_or_else(|e| {
            tracing::warn!(
                column = idx,
                declared_type = declared,
                error = %e,
                "Failed to decode SQLite value, returning NULL"
            );
            SqlValue::Null
        })
    }
}
