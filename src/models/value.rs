//! Bound parameter and decoded cell values.
//!
//! [`SqlValue`] is the single representation used for positional parameters and
//! for cells read back from a row. [`ColumnValue`] connects Rust field types to it.

use crate::models::entity::FieldType;
use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

/// Text format used for date-time columns.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A parameter value for parameterized statements.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Text value
    Text(String),
}

impl SqlValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this value for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
        }
    }

    /// Wrap the value as a `%value%` pattern for LIKE matching.
    pub fn like_pattern(&self) -> SqlValue {
        SqlValue::Text(format!("%{}%", self))
    }
}

impl std::fmt::Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{}", v),
        }
    }
}

/// Failure converting a [`SqlValue`] into a field type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot convert {found} value into {expected}")]
pub struct ValueError {
    pub expected: &'static str,
    pub found: &'static str,
}

impl ValueError {
    fn new(expected: &'static str, value: &SqlValue) -> Self {
        Self {
            expected,
            found: value.type_name(),
        }
    }
}

/// A Rust type that can be stored in a single column.
///
/// `from_value(SqlValue::Null)` yields the zero value of the type, mirroring a
/// freshly zero-initialized entity whose column was NULL.
pub trait ColumnValue: Sized {
    /// Semantic type used by the type mapper when no override is declared.
    const FIELD_TYPE: FieldType;

    fn to_value(&self) -> SqlValue;

    fn from_value(value: SqlValue) -> Result<Self, ValueError>;
}

impl ColumnValue for String {
    const FIELD_TYPE: FieldType = FieldType::Text;

    fn to_value(&self) -> SqlValue {
        SqlValue::Text(self.clone())
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Null => Ok(String::new()),
            SqlValue::Text(s) => Ok(s),
            SqlValue::Int(v) => Ok(v.to_string()),
            SqlValue::Float(v) => Ok(v.to_string()),
            SqlValue::Bool(v) => Ok(v.to_string()),
        }
    }
}

macro_rules! impl_integer_column {
    ($($ty:ty => $field:ident),+ $(,)?) => {
        $(
            impl ColumnValue for $ty {
                const FIELD_TYPE: FieldType = FieldType::$field;

                fn to_value(&self) -> SqlValue {
                    SqlValue::Int(i64::from(*self))
                }

                fn from_value(value: SqlValue) -> Result<Self, ValueError> {
                    match value {
                        SqlValue::Null => Ok(0),
                        SqlValue::Int(v) => {
                            <$ty>::try_from(v).map_err(|_| ValueError::new(stringify!($ty), &value))
                        }
                        SqlValue::Bool(v) => Ok(<$ty>::from(v)),
                        other => Err(ValueError::new(stringify!($ty), &other)),
                    }
                }
            }
        )+
    };
}

impl_integer_column!(i8 => Int8, i16 => Int16, i32 => Int32, i64 => Int64);

impl ColumnValue for f32 {
    const FIELD_TYPE: FieldType = FieldType::Float32;

    fn to_value(&self) -> SqlValue {
        SqlValue::Float(f64::from(*self))
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Null => Ok(0.0),
            SqlValue::Float(v) => Ok(v as f32),
            SqlValue::Int(v) => Ok(v as f32),
            other => Err(ValueError::new("f32", &other)),
        }
    }
}

impl ColumnValue for f64 {
    const FIELD_TYPE: FieldType = FieldType::Float64;

    fn to_value(&self) -> SqlValue {
        SqlValue::Float(*self)
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Null => Ok(0.0),
            SqlValue::Float(v) => Ok(v),
            SqlValue::Int(v) => Ok(v as f64),
            other => Err(ValueError::new("f64", &other)),
        }
    }
}

impl ColumnValue for bool {
    const FIELD_TYPE: FieldType = FieldType::Bool;

    fn to_value(&self) -> SqlValue {
        SqlValue::Bool(*self)
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Null => Ok(false),
            SqlValue::Bool(v) => Ok(v),
            SqlValue::Int(v) => Ok(v != 0),
            other => Err(ValueError::new("bool", &other)),
        }
    }
}

// Characters live in a TINYINT column as their code point.
impl ColumnValue for char {
    const FIELD_TYPE: FieldType = FieldType::Char;

    fn to_value(&self) -> SqlValue {
        SqlValue::Int(i64::from(u32::from(*self)))
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Null => Ok('\0'),
            SqlValue::Int(v) => u32::try_from(v)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| ValueError::new("char", &value)),
            SqlValue::Text(ref s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(c),
                    _ => Err(ValueError::new("char", &value)),
                }
            }
            other => Err(ValueError::new("char", &other)),
        }
    }
}

impl ColumnValue for Uuid {
    const FIELD_TYPE: FieldType = FieldType::Other("uuid");

    fn to_value(&self) -> SqlValue {
        SqlValue::Text(self.hyphenated().to_string())
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Null => Ok(Uuid::nil()),
            SqlValue::Text(ref s) => Uuid::parse_str(s).map_err(|_| ValueError::new("uuid", &value)),
            other => Err(ValueError::new("uuid", &other)),
        }
    }
}

impl ColumnValue for NaiveDateTime {
    const FIELD_TYPE: FieldType = FieldType::Other("datetime");

    fn to_value(&self) -> SqlValue {
        SqlValue::Text(self.format(DATETIME_FORMAT).to_string())
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Null => Ok(NaiveDateTime::default()),
            SqlValue::Text(ref s) => NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
                .map_err(|_| ValueError::new("datetime", &value)),
            other => Err(ValueError::new("datetime", &other)),
        }
    }
}

impl<T: ColumnValue> ColumnValue for Option<T> {
    const FIELD_TYPE: FieldType = T::FIELD_TYPE;

    fn to_value(&self) -> SqlValue {
        match self {
            Some(v) => v.to_value(),
            None => SqlValue::Null,
        }
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
