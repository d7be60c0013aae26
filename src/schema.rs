//! Column types and the value-to-column mapping
//!
//! Every canonical [`Value`] maps to exactly one [`ColumnType`]:
//!
//! - `Bool` -> `UInt8` (and `Array(UInt8)` for bool arrays)
//! - `Int` -> `Int32`, `Float` -> `Float32`
//! - `Text` and `Bytes` -> `String`
//! - `Date` -> `Date`, `DateTime` -> `DateTime`
//! - arrays keep their exact element width, e.g. `Array(Int64)`
//!
//! The mapping is total: there is no normalized value without a column
//! type, so schema evolution can always derive the type of a new column
//! from the first value traced into it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::{ArrayValue, Scalar, Value};

/// Name of the ingestion-time column every experiment table carries.
pub const TIME_COLUMN: &str = "time";

/// Name of the step counter column.
pub const STEP_COLUMN: &str = "step";

/// Name of the phase label column.
pub const PHASE_COLUMN: &str = "phase";

/// Scalar column types understood by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarType {
    /// 8-bit unsigned integer (also the storage type for booleans).
    UInt8,
    /// 16-bit unsigned integer.
    UInt16,
    /// 32-bit unsigned integer.
    UInt32,
    /// 64-bit unsigned integer.
    UInt64,
    /// 8-bit signed integer.
    Int8,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
    /// UTF-8 text or raw bytes.
    String,
    /// Calendar date.
    Date,
    /// Point in time.
    DateTime,
}

impl ScalarType {
    /// Store-facing spelling of the type, e.g. `"UInt8"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UInt8 => "UInt8",
            Self::UInt16 => "UInt16",
            Self::UInt32 => "UInt32",
            Self::UInt64 => "UInt64",
            Self::Int8 => "Int8",
            Self::Int16 => "Int16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::Float32 => "Float32",
            Self::Float64 => "Float64",
            Self::String => "String",
            Self::Date => "Date",
            Self::DateTime => "DateTime",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full column type: a scalar or an array of scalars.
///
/// Arrays never nest. Rank > 1 data is rejected during normalization,
/// so `Array(Array(...))` cannot occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    /// Scalar column.
    Scalar(ScalarType),
    /// One-dimensional array column.
    Array(ScalarType),
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(inner) => f.write_str(inner.as_str()),
            Self::Array(inner) => write!(f, "Array({inner})"),
        }
    }
}

/// Named column of an experiment table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    column_type: ColumnType,
}

impl Column {
    /// Creates a column descriptor.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }

    /// Column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column type.
    #[must_use]
    pub const fn column_type(&self) -> ColumnType {
        self.column_type
    }
}

/// The three columns every experiment table starts with.
///
/// `time` defaults to the ingestion timestamp when a row does not carry
/// one, `step` holds the caller's counter, `phase` the run phase label.
#[must_use]
pub fn base_schema() -> Vec<Column> {
    vec![
        Column::new(TIME_COLUMN, ColumnType::Scalar(ScalarType::DateTime)),
        Column::new(STEP_COLUMN, ColumnType::Scalar(ScalarType::UInt32)),
        Column::new(PHASE_COLUMN, ColumnType::Scalar(ScalarType::String)),
    ]
}

impl Scalar {
    /// The scalar column type this value is stored as.
    #[must_use]
    pub const fn stored_as(&self) -> ScalarType {
        match self {
            Self::Bool(_) => ScalarType::UInt8,
            Self::Int(_) => ScalarType::Int32,
            Self::Float(_) => ScalarType::Float32,
            Self::Text(_) | Self::Bytes(_) => ScalarType::String,
            Self::Date(_) => ScalarType::Date,
            Self::DateTime(_) => ScalarType::DateTime,
        }
    }
}

impl ArrayValue {
    /// The scalar column type of the array's elements.
    #[must_use]
    pub const fn element_type(&self) -> ScalarType {
        match self {
            Self::Bool(_) => ScalarType::UInt8,
            Self::Int8(_) => ScalarType::Int8,
            Self::Int16(_) => ScalarType::Int16,
            Self::Int32(_) => ScalarType::Int32,
            Self::Int64(_) => ScalarType::Int64,
            Self::UInt8(_) => ScalarType::UInt8,
            Self::UInt16(_) => ScalarType::UInt16,
            Self::UInt32(_) => ScalarType::UInt32,
            Self::UInt64(_) => ScalarType::UInt64,
            Self::Float32(_) => ScalarType::Float32,
            Self::Float64(_) => ScalarType::Float64,
            Self::Text(_) | Self::Bytes(_) => ScalarType::String,
            Self::Date(_) => ScalarType::Date,
            Self::DateTime(_) => ScalarType::DateTime,
        }
    }
}

impl Value {
    /// The column type this canonical value is stored in.
    ///
    /// Total over all normalized values, so callers never need a
    /// fallback arm.
    #[must_use]
    pub const fn column_type(&self) -> ColumnType {
        match self {
            Self::Scalar(scalar) => ColumnType::Scalar(scalar.stored_as()),
            Self::Array(array) => ColumnType::Array(array.element_type()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_is_stored_as_uint8() {
        assert_eq!(Scalar::Bool(true).stored_as(), ScalarType::UInt8);
        let value = Value::Array(ArrayValue::Bool(vec![true, false]));
        assert_eq!(value.column_type(), ColumnType::Array(ScalarType::UInt8));
    }

    #[test]
    fn bytes_are_stored_as_string() {
        assert_eq!(Scalar::Bytes(vec![0xFF]).stored_as(), ScalarType::String);
        let value = Value::Array(ArrayValue::Bytes(vec![vec![0x01]]));
        assert_eq!(value.column_type(), ColumnType::Array(ScalarType::String));
    }

    #[test]
    fn arrays_keep_exact_width() {
        let value = Value::Array(ArrayValue::Int64(vec![1, 2]));
        assert_eq!(value.column_type(), ColumnType::Array(ScalarType::Int64));
        let value = Value::Array(ArrayValue::Float64(vec![0.5]));
        assert_eq!(value.column_type(), ColumnType::Array(ScalarType::Float64));
    }

    #[test]
    fn default_scalar_widths() {
        assert_eq!(
            Value::Scalar(Scalar::Int(7)).column_type(),
            ColumnType::Scalar(ScalarType::Int32)
        );
        assert_eq!(
            Value::Scalar(Scalar::Float(0.5)).column_type(),
            ColumnType::Scalar(ScalarType::Float32)
        );
    }

    #[test]
    fn column_types_render_store_spellings() {
        assert_eq!(ColumnType::Scalar(ScalarType::UInt8).to_string(), "UInt8");
        assert_eq!(
            ColumnType::Array(ScalarType::Float32).to_string(),
            "Array(Float32)"
        );
    }

    #[test]
    fn base_schema_shape() {
        let columns = base_schema();
        let names: Vec<&str> = columns.iter().map(Column::name).collect();
        assert_eq!(names, vec![TIME_COLUMN, STEP_COLUMN, PHASE_COLUMN]);
        assert_eq!(
            columns[1].column_type(),
            ColumnType::Scalar(ScalarType::UInt32)
        );
    }
}
