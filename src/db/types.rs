//! Type mappings between entity fields and database columns.
//!
//! # Architecture
//!
//! The forward direction is a pure table: [`map_type`] turns a semantic
//! [`FieldType`] into the SQL keyword used in DDL.
//!
//! The reverse direction uses a two-phase approach:
//! 1. `TypeCategory` classifies the runtime type of a cell into a logical category
//! 2. Backend-specific decoders extract the value as a [`SqlValue`]
//!
//! Decoding is by the runtime type of the value, not by the declared field type,
//! so a field only has to accept the value the backend actually produced.

use crate::error::{DbError, DbResult};
use crate::models::{Backend, DATETIME_FORMAT, FieldDescriptor, FieldType, SqlValue};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Decode, Row, Type, TypeInfo, ValueRef};

// =============================================================================
// Field Type -> Column Type
// =============================================================================

/// SQL column keyword for a semantic field type.
///
/// Unrecognized types fall back to `VARCHAR(255)`.
pub fn map_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Text => "TEXT",
        FieldType::Int8 | FieldType::Bool | FieldType::Char => "TINYINT",
        FieldType::Int16 => "SMALLINT",
        FieldType::Int32 => "INT",
        FieldType::Int64 => "BIGINT",
        FieldType::Float32 => "FLOAT",
        FieldType::Float64 => "DOUBLE",
        FieldType::Other(_) => "VARCHAR(255)",
    }
}

/// Column type of a field: the explicit override if declared, else [`map_type`].
pub fn column_type(field: &FieldDescriptor) -> &str {
    field
        .column_type
        .as_deref()
        .unwrap_or_else(|| map_type(field.field_type))
}

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Temporal,
    Unknown,
}

const INTEGER_TYPES: &[&str] = &[
    "tinyint",
    "smallint",
    "mediumint",
    "int",
    "integer",
    "bigint",
    "int2",
    "int4",
    "int8",
    "serial",
    "bigserial",
];

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, backend: Backend) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if backend == Backend::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    // Integer types, matched on the base name so TINYTEXT or POINT stay out
    let base = lower.split_whitespace().next().unwrap_or_default();
    if INTEGER_TYPES.contains(&base) {
        return TypeCategory::Integer;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower.contains("blob") || lower.contains("binary") {
        return TypeCategory::Binary;
    }

    if lower.contains("date") || lower.contains("time") || lower == "year" {
        return TypeCategory::Temporal;
    }

    if lower.contains("char") || lower.contains("text") || lower == "enum" || lower == "json" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
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

fn undecodable(column: &str, type_name: &str) -> DbError {
    DbError::mapping(
        format!("Cannot decode {} value", type_name),
        column.to_string(),
    )
}

fn binary_to_text(bytes: Vec<u8>, column: &str) -> DbResult<SqlValue> {
    String::from_utf8(bytes)
        .map(SqlValue::Text)
        .map_err(|_| DbError::mapping("Binary value is not valid UTF-8", column.to_string()))
}

// =============================================================================
// Backend-Specific Decoders
// =============================================================================

pub(crate) mod mysql {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    /// Decode the cell named `column`. A missing column is a mapping error.
    pub fn decode_value(row: &MySqlRow, column: &str) -> DbResult<SqlValue> {
        let raw = row.try_get_raw(column)?;
        if raw.is_null() {
            return Ok(SqlValue::Null);
        }
        let info = raw.type_info();
        let type_name = info.name().to_string();

        match categorize_type(&type_name, Backend::MySql) {
            TypeCategory::Integer => decode_integer(row, column, &type_name),
            TypeCategory::Boolean => decode_boolean(row, column, &type_name),
            TypeCategory::Float => decode_float(row, column, &type_name),
            TypeCategory::Decimal => decode_decimal(row, column),
            TypeCategory::Binary => binary_to_text(row.try_get::<Vec<u8>, _>(column)?, column),
            TypeCategory::Temporal => decode_temporal(row, column, &type_name),
            TypeCategory::Text | TypeCategory::Unknown => Ok(SqlValue::Text(
                row.try_get::<String, _>(column)?,
            )),
        }
    }

    fn decode_integer(row: &MySqlRow, column: &str, type_name: &str) -> DbResult<SqlValue> {
        // Try signed types
        if let Ok(v) = row.try_get::<i64, _>(column) {
            return Ok(SqlValue::Int(v));
        }
        if let Ok(v) = row.try_get::<i32, _>(column) {
            return Ok(SqlValue::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<i16, _>(column) {
            return Ok(SqlValue::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<i8, _>(column) {
            return Ok(SqlValue::Int(v.into()));
        }
        // Try unsigned types
        if let Ok(v) = row.try_get::<u64, _>(column) {
            return i64::try_from(v)
                .map(SqlValue::Int)
                .map_err(|_| DbError::mapping(format!("{} exceeds i64", v), column.to_string()));
        }
        if let Ok(v) = row.try_get::<u32, _>(column) {
            return Ok(SqlValue::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<u16, _>(column) {
            return Ok(SqlValue::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<u8, _>(column) {
            return Ok(SqlValue::Int(v.into()));
        }
        Err(undecodable(column, type_name))
    }

    fn decode_boolean(row: &MySqlRow, column: &str, type_name: &str) -> DbResult<SqlValue> {
        if let Ok(v) = row.try_get::<bool, _>(column) {
            return Ok(SqlValue::Bool(v));
        }
        decode_integer(row, column, type_name)
    }

    fn decode_float(row: &MySqlRow, column: &str, type_name: &str) -> DbResult<SqlValue> {
        if let Ok(v) = row.try_get::<f64, _>(column) {
            return Ok(SqlValue::Float(v));
        }
        if let Ok(v) = row.try_get::<f32, _>(column) {
            return Ok(SqlValue::Float(v.into()));
        }
        Err(undecodable(column, type_name))
    }

    fn decode_decimal(row: &MySqlRow, column: &str) -> DbResult<SqlValue> {
        let raw = row.try_get::<RawDecimal, _>(column)?;
        Ok(raw
            .0
            .parse::<f64>()
            .map(SqlValue::Float)
            .unwrap_or(SqlValue::Text(raw.0)))
    }

    fn decode_temporal(row: &MySqlRow, column: &str, type_name: &str) -> DbResult<SqlValue> {
        if let Ok(v) = row.try_get::<NaiveDateTime, _>(column) {
            return Ok(SqlValue::Text(v.format(DATETIME_FORMAT).to_string()));
        }
        if let Ok(v) = row.try_get::<NaiveDate, _>(column) {
            return Ok(SqlValue::Text(v.to_string()));
        }
        if let Ok(v) = row.try_get::<String, _>(column) {
            return Ok(SqlValue::Text(v));
        }
        Err(undecodable(column, type_name))
    }
}

pub(crate) mod sqlite {
    use super::*;

    /// Decode the cell named `column` by its storage class.
    pub fn decode_value(row: &SqliteRow, column: &str) -> DbResult<SqlValue> {
        let raw = row.try_get_raw(column)?;
        if raw.is_null() {
            return Ok(SqlValue::Null);
        }
        let info = raw.type_info();
        let type_name = info.name().to_string();

        match categorize_type(&type_name, Backend::SQLite) {
            TypeCategory::Integer => Ok(SqlValue::Int(row.try_get::<i64, _>(column)?)),
            TypeCategory::Boolean => Ok(SqlValue::Bool(row.try_get::<bool, _>(column)?)),
            TypeCategory::Float | TypeCategory::Decimal => {
                Ok(SqlValue::Float(row.try_get::<f64, _>(column)?))
            }
            TypeCategory::Binary => binary_to_text(row.try_get::<Vec<u8>, _>(column)?, column),
            TypeCategory::Text | TypeCategory::Temporal => {
                Ok(SqlValue::Text(row.try_get::<String, _>(column)?))
            }
            TypeCategory::Unknown => Err(undecodable(column, &type_name)),
        }
    }
}
