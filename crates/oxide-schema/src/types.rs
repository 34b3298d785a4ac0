//! Column types, literal values and the runtime-type mapping provider.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Engine-neutral column data types.
///
/// Interpreters map these to engine-specific type names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Small integer (2 bytes).
    Smallint,
    /// Integer (4 bytes).
    Integer,
    /// Big integer (8 bytes).
    Bigint,
    /// Real (4-byte float).
    Real,
    /// Double precision (8-byte float).
    Double,
    /// Decimal with optional precision and scale.
    Decimal {
        /// Total number of digits.
        precision: Option<u16>,
        /// Number of digits after decimal point.
        scale: Option<u16>,
    },
    /// Fixed-length character string.
    Char(Option<u32>),
    /// Variable-length character string.
    Varchar(Option<u32>),
    /// Text (variable length, no limit).
    Text,
    /// Binary large object.
    Blob,
    /// Date.
    Date,
    /// Time of day.
    Time,
    /// Date and time.
    Timestamp,
    /// Boolean.
    Boolean,
    /// JSON document.
    Json,
    /// UUID.
    Uuid,
    /// Engine-specific type passed through verbatim.
    Custom(String),
}

impl DataType {
    /// Returns true for integer, floating point and decimal types.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Smallint
                | Self::Integer
                | Self::Bigint
                | Self::Real
                | Self::Double
                | Self::Decimal { .. }
        )
    }

    /// Returns true for character types.
    #[must_use]
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::Char(_) | Self::Varchar(_) | Self::Text)
    }
}

/// A literal SQL value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
}

/// Trait for types that can be converted to SQL literal values.
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    fn to_sql_value(self) -> SqlValue;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Bool(self)
    }
}

impl ToSqlValue for i32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(i64::from(self))
    }
}

impl ToSqlValue for i64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(self)
    }
}

impl ToSqlValue for f64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(self)
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(String::from(self))
    }
}

impl ToSqlValue for String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self)
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self)
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        match self {
            Some(v) => v.to_sql_value(),
            None => SqlValue::Null,
        }
    }
}

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ForeignKeyAction {
    /// No action (error if referenced row is deleted/updated).
    #[default]
    NoAction,
    /// Restrict (same as NoAction but checked immediately).
    Restrict,
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Set the foreign key column to NULL.
    SetNull,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
        }
    }
}

/// Sort direction of an index column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SortOrder {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// Runtime value categories the type provider knows how to map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// `bool`.
    Bool,
    /// `i16`.
    I16,
    /// `i32`.
    I32,
    /// `i64`.
    I64,
    /// `f32`.
    F32,
    /// `f64`.
    F64,
    /// `String` / `&str`.
    Text,
    /// `Vec<u8>`.
    Bytes,
    /// `chrono::NaiveDate`.
    Date,
    /// `chrono::NaiveTime`.
    Time,
    /// `chrono::NaiveDateTime` / `chrono::DateTime<Utc>`.
    DateTime,
}

/// Rust types with a known SQL column mapping.
pub trait SqlTyped {
    /// The value category used to look up the data type.
    const KIND: ValueKind;
    /// Whether the column accepts NULL.
    const NULLABLE: bool = false;
}

macro_rules! impl_sql_typed {
    ($($ty:ty => $kind:ident),+ $(,)?) => {
        $(impl SqlTyped for $ty {
            const KIND: ValueKind = ValueKind::$kind;
        })+
    };
}

impl_sql_typed!(
    bool => Bool,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    String => Text,
    &str => Text,
    Vec<u8> => Bytes,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => DateTime,
    DateTime<Utc> => DateTime,
);

impl<T: SqlTyped> SqlTyped for Option<T> {
    const KIND: ValueKind = T::KIND;
    const NULLABLE: bool = true;
}

/// Maps runtime types to column types and picks backfill values.
pub trait TypeProvider: Send + Sync {
    /// Returns the column type used for values of `kind`.
    fn data_type(&self, kind: ValueKind) -> DataType;

    /// Returns a type-appropriate value used to fill NOT NULL columns
    /// that have no default during table reconstruction.
    fn backfill_value(&self, data_type: &DataType) -> SqlValue;
}

/// The stock type mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTypeProvider;

impl TypeProvider for DefaultTypeProvider {
    fn data_type(&self, kind: ValueKind) -> DataType {
        match kind {
            ValueKind::Bool => DataType::Boolean,
            ValueKind::I16 => DataType::Smallint,
            ValueKind::I32 => DataType::Integer,
            ValueKind::I64 => DataType::Bigint,
            ValueKind::F32 => DataType::Real,
            ValueKind::F64 => DataType::Double,
            ValueKind::Text => DataType::Text,
            ValueKind::Bytes => DataType::Blob,
            ValueKind::Date => DataType::Date,
            ValueKind::Time => DataType::Time,
            ValueKind::DateTime => DataType::Timestamp,
        }
    }

    fn backfill_value(&self, data_type: &DataType) -> SqlValue {
        let epoch = DateTime::<Utc>::UNIX_EPOCH.naive_utc();
        match data_type {
            DataType::Smallint | DataType::Integer | DataType::Bigint => SqlValue::Int(0),
            DataType::Real | DataType::Double | DataType::Decimal { .. } => SqlValue::Float(0.0),
            DataType::Char(_) | DataType::Varchar(_) | DataType::Text => {
                SqlValue::Text(String::new())
            }
            DataType::Blob => SqlValue::Blob(Vec::new()),
            DataType::Date => SqlValue::Text(epoch.format("%Y-%m-%d").to_string()),
            DataType::Time => SqlValue::Text(epoch.format("%H:%M:%S").to_string()),
            DataType::Timestamp => SqlValue::Text(epoch.format("%Y-%m-%d %H:%M:%S").to_string()),
            DataType::Boolean => SqlValue::Bool(false),
            DataType::Json => SqlValue::Text(String::from("{}")),
            DataType::Uuid => SqlValue::Text(String::from("00000000-0000-0000-0000-000000000000")),
            DataType::Custom(_) => SqlValue::Text(String::new()),
        }
    }
}
