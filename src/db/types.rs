//! Row decoding for the sqlx adapter.
//!
//! Column values are classified into a `TypeCategory` from the backend's type name,
//! then decoded by trying the Rust types that category allows, first match wins.

use crate::models::{DatabaseType, Row};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row as _, Type, TypeInfo};

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
    Temporal,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric first, it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC affinity stores floats
        if db == DatabaseType::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("timestamp")
        || lower.contains("datetime")
        || matches!(lower.as_str(), "date" | "time" | "timetz")
    {
        return TypeCategory::Temporal;
    }

    if lower.contains("char") || lower.contains("text") || lower == "string" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

/// Raw DECIMAL text as MySQL sends it, preserving the exact representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Binary payloads are exposed as base64 text.
pub fn binary_value(bytes: Vec<u8>) -> JsonValue {
    JsonValue::String(STANDARD.encode(bytes))
}

/// JSON stored as text decodes into structured JSON when it parses.
fn json_text_value(text: String) -> JsonValue {
    serde_json::from_str(&text).unwrap_or(JsonValue::String(text))
}

fn timestamp_value(v: DateTime<Utc>) -> JsonValue {
    JsonValue::String(v.to_rfc3339())
}

fn display_value<T: ToString>(v: T) -> JsonValue {
    JsonValue::String(v.to_string())
}

/// Try `Option<T>` decodes in order; the first type sqlx accepts produces the value.
macro_rules! decode_first {
    ($row:expr, $idx:expr; $($ty:ty => $conv:expr),+ $(,)?) => {
        None
            $(.or_else(|| {
                $row.try_get::<Option<$ty>, _>($idx)
                    .ok()
                    .map(|v| v.map($conv).unwrap_or(JsonValue::Null))
            }))+
            .unwrap_or(JsonValue::Null)
    };
}

/// Trait for converting database rows to JSON maps.
pub trait RowToJson {
    fn to_json_map(&self) -> Row;
}

impl RowToJson for MySqlRow {
    fn to_json_map(&self) -> Row {
        self.columns()
            .iter()
            .map(|col| {
                let category = categorize_type(col.type_info().name(), DatabaseType::MySQL);
                (col.name().to_string(), decode_mysql(self, col.ordinal(), category))
            })
            .collect()
    }
}

impl RowToJson for PgRow {
    fn to_json_map(&self) -> Row {
        self.columns()
            .iter()
            .map(|col| {
                let category = categorize_type(col.type_info().name(), DatabaseType::PostgreSQL);
                (col.name().to_string(), decode_postgres(self, col.ordinal(), category))
            })
            .collect()
    }
}

impl RowToJson for SqliteRow {
    fn to_json_map(&self) -> Row {
        self.columns()
            .iter()
            .map(|col| {
                let category = categorize_type(col.type_info().name(), DatabaseType::SQLite);
                (col.name().to_string(), decode_sqlite(self, col.ordinal(), category))
            })
            .collect()
    }
}

fn decode_mysql(row: &MySqlRow, idx: usize, category: TypeCategory) -> JsonValue {
    match category {
        TypeCategory::Integer => decode_first!(row, idx; i64 => JsonValue::from, u64 => JsonValue::from),
        TypeCategory::Float => decode_first!(row, idx; f64 => JsonValue::from, f32 => JsonValue::from),
        TypeCategory::Decimal => decode_first!(row, idx; RawDecimal => |d: RawDecimal| JsonValue::String(d.0)),
        TypeCategory::Boolean => decode_first!(row, idx; bool => JsonValue::Bool),
        TypeCategory::Binary => decode_first!(row, idx; Vec<u8> => binary_value),
        TypeCategory::Json => decode_first!(row, idx; JsonValue => |v: JsonValue| v),
        TypeCategory::Temporal => decode_first!(row, idx;
            DateTime<Utc> => timestamp_value,
            NaiveDateTime => display_value,
            NaiveDate => display_value,
            NaiveTime => display_value,
        ),
        TypeCategory::Text | TypeCategory::Unknown => {
            decode_first!(row, idx; String => JsonValue::String, Vec<u8> => binary_value)
        }
    }
}

fn decode_postgres(row: &PgRow, idx: usize, category: TypeCategory) -> JsonValue {
    match category {
        TypeCategory::Integer => decode_first!(row, idx; i64 => JsonValue::from, i32 => JsonValue::from, i16 => JsonValue::from),
        TypeCategory::Float => decode_first!(row, idx; f64 => JsonValue::from, f32 => JsonValue::from),
        // NUMERIC has no lossless decode without a decimal crate; it surfaces as null
        TypeCategory::Decimal => {
            tracing::debug!(column = idx, "NUMERIC column decoded as null");
            JsonValue::Null
        }
        TypeCategory::Boolean => decode_first!(row, idx; bool => JsonValue::Bool),
        TypeCategory::Binary => decode_first!(row, idx; Vec<u8> => binary_value),
        TypeCategory::Json => decode_first!(row, idx; JsonValue => |v: JsonValue| v),
        TypeCategory::Temporal => decode_first!(row, idx;
            DateTime<Utc> => timestamp_value,
            NaiveDateTime => display_value,
            NaiveDate => display_value,
            NaiveTime => display_value,
        ),
        TypeCategory::Text | TypeCategory::Unknown => decode_first!(row, idx; String => JsonValue::String),
    }
}

fn decode_sqlite(row: &SqliteRow, idx: usize, category: TypeCategory) -> JsonValue {
    match category {
        TypeCategory::Integer => decode_first!(row, idx; i64 => JsonValue::from),
        TypeCategory::Float | TypeCategory::Decimal => decode_first!(row, idx; f64 => JsonValue::from),
        TypeCategory::Boolean => decode_first!(row, idx; bool => JsonValue::Bool, i64 => JsonValue::from),
        TypeCategory::Binary => decode_first!(row, idx; Vec<u8> => binary_value),
        TypeCategory::Json => decode_first!(row, idx; String => json_text_value),
        TypeCategory::Temporal => decode_first!(row, idx;
            String => JsonValue::String,
            NaiveDateTime => display_value,
            NaiveDate => display_value,
        ),
        // Dynamically typed values (expressions, NULL) fall through every storage class
        TypeCategory::Text | TypeCategory::Unknown => decode_first!(row, idx;
            String => JsonValue::String,
            i64 => JsonValue::from,
            f64 => JsonValue::from,
            Vec<u8> => binary_value,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(
            categorize_type("INT", DatabaseType::MySQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("BIGINT", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("SERIAL", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_decimal() {
        assert_eq!(
            categorize_type("DECIMAL", DatabaseType::MySQL),
            TypeCategory::Decimal
        );
        // SQLite NUMERIC is a float
        assert_eq!(
            categorize_type("numeric", DatabaseType::SQLite),
            TypeCategory::Float
        );
    }

    #[test]
    fn test_categorize_type_temporal_and_text() {
        assert_eq!(
            categorize_type("TIMESTAMPTZ", DatabaseType::PostgreSQL),
            TypeCategory::Temporal
        );
        assert_eq!(
            categorize_type("DATETIME", DatabaseType::MySQL),
            TypeCategory::Temporal
        );
        assert_eq!(
            categorize_type("VARCHAR", DatabaseType::MySQL),
            TypeCategory::Text
        );
        assert_eq!(
            categorize_type("NULL", DatabaseType::SQLite),
            TypeCategory::Unknown
        );
    }

    #[test]
    fn test_binary_value_is_base64() {
        assert_eq!(
            binary_value(b"hello world".to_vec()),
            JsonValue::String("aGVsbG8gd29ybGQ=".to_string())
        );
    }

    #[test]
    fn test_json_text_value_falls_back_to_string() {
        assert_eq!(json_text_value(r#"{"a":1}"#.to_string())["a"], 1);
        assert_eq!(
            json_text_value("not json".to_string()),
            JsonValue::String("not json".to_string())
        );
    }
}
