//! Measurement values and their canonical forms
//!
//! Metrics arrive as [`MetricValue`]: plain scalars, width-preserving
//! arrays, shape-carrying tensors, or generic collections. Normalization
//! collapses all of them into [`Value`], the canonical form the rest of
//! the pipeline stores and type-maps.
//!
//! Width rules:
//! - Scalars use the default widths (`i32`, `f32`); wider measurements
//!   belong in arrays, which keep their exact element width.
//! - Collections adopt the default width of their element kind.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Single measurement of one of the supported scalar kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    /// Boolean flag, stored as `UInt8`.
    Bool(bool),
    /// Default-width signed integer.
    Int(i32),
    /// Default-width floating point number.
    Float(f32),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes, stored in a `String` column.
    Bytes(Vec<u8>),
    /// Calendar date without a time of day.
    Date(NaiveDate),
    /// Point in time, UTC.
    DateTime(DateTime<Utc>),
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for Scalar {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for Scalar {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<NaiveDate> for Scalar {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<DateTime<Utc>> for Scalar {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

/// One-dimensional array with an exact element width.
///
/// Unlike scalars, arrays never widen or narrow: an `Int8` array stays
/// `Array(Int8)` all the way to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayValue {
    /// Booleans, stored as `Array(UInt8)`.
    Bool(Vec<bool>),
    /// 8-bit signed integers.
    Int8(Vec<i8>),
    /// 16-bit signed integers.
    Int16(Vec<i16>),
    /// 32-bit signed integers.
    Int32(Vec<i32>),
    /// 64-bit signed integers.
    Int64(Vec<i64>),
    /// 8-bit unsigned integers.
    UInt8(Vec<u8>),
    /// 16-bit unsigned integers.
    UInt16(Vec<u16>),
    /// 32-bit unsigned integers.
    UInt32(Vec<u32>),
    /// 64-bit unsigned integers.
    UInt64(Vec<u64>),
    /// 32-bit floats.
    Float32(Vec<f32>),
    /// 64-bit floats.
    Float64(Vec<f64>),
    /// UTF-8 strings.
    Text(Vec<String>),
    /// Byte strings, stored as `Array(String)`.
    Bytes(Vec<Vec<u8>>),
    /// Calendar dates.
    Date(Vec<NaiveDate>),
    /// Points in time, UTC.
    DateTime(Vec<DateTime<Utc>>),
}

impl ArrayValue {
    /// Number of elements in the array.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Bool(v) => v.len(),
            Self::Int8(v) => v.len(),
            Self::Int16(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::UInt8(v) => v.len(),
            Self::UInt16(v) => v.len(),
            Self::UInt32(v) => v.len(),
            Self::UInt64(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Text(v) => v.len(),
            Self::Bytes(v) => v.len(),
            Self::Date(v) => v.len(),
            Self::DateTime(v) => v.len(),
        }
    }

    /// Whether the array has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

macro_rules! array_from_vec {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl From<Vec<$ty>> for ArrayValue {
            fn from(values: Vec<$ty>) -> Self {
                Self::$variant(values)
            }
        }
    )*};
}

array_from_vec! {
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    String => Text,
    Vec<u8> => Bytes,
    NaiveDate => Date,
    DateTime<Utc> => DateTime,
}

/// Shape-carrying numeric buffer, as handed over by an ML framework.
///
/// Only rank 0 and rank 1 tensors can be traced; higher ranks are
/// rejected during normalization. The buffer is row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: ArrayValue,
    shape: Vec<usize>,
}

impl Tensor {
    /// Creates a tensor from a flat buffer and its shape.
    ///
    /// The shape is validated lazily: tracing a tensor whose shape does
    /// not describe its buffer fails normalization, not construction.
    pub fn new(data: impl Into<ArrayValue>, shape: impl Into<Vec<usize>>) -> Self {
        Self {
            data: data.into(),
            shape: shape.into(),
        }
    }

    /// Flat element buffer.
    #[must_use]
    pub const fn data(&self) -> &ArrayValue {
        &self.data
    }

    /// Tensor shape, one extent per dimension.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements in the flat buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the flat buffer has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Materializes the tensor as its row-major element buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shape`] for tensors of rank 2 or higher, and
    /// [`Error::UnsupportedType`] when the shape does not describe the
    /// number of buffered elements.
    pub fn into_row_major(self) -> Result<ArrayValue> {
        let ndim = self.ndim();
        if ndim > 1 {
            return Err(Error::Shape { ndim });
        }
        let expected: usize = self.shape.iter().product();
        if self.data.len() != expected {
            return Err(Error::UnsupportedType(format!(
                "tensor of shape {:?} does not describe {} buffered element(s)",
                self.shape,
                self.data.len()
            )));
        }
        Ok(self.data)
    }
}

/// Raw measurement accepted by [`Tracker::trace`](crate::Tracker::trace).
///
/// Most callers never name this type: scalars, typed vectors and tensors
/// convert into it via `From`. `Vec<u8>` deliberately has no conversion
/// because it could mean either a [`Scalar::Bytes`] blob or an
/// [`ArrayValue::UInt8`] array; pick one explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    /// Single scalar measurement.
    Scalar(Scalar),
    /// Width-preserving one-dimensional array.
    Array(ArrayValue),
    /// Shape-carrying tensor, materialized row-major during normalization.
    Tensor(Tensor),
    /// Generic collection; all elements must share one scalar kind.
    List(Vec<Scalar>),
}

impl MetricValue {
    /// Normalizes the raw measurement into its canonical form.
    ///
    /// Scalars pass through, arrays and rank <= 1 tensors become
    /// [`Value::Array`], collections are checked for a single element
    /// kind and collected into the default-width array of that kind.
    ///
    /// # Errors
    ///
    /// - [`Error::Shape`] for tensors of rank 2 or higher
    /// - [`Error::MixedElementTypes`] for collections mixing scalar kinds
    /// - [`Error::EmptyValue`] for empty arrays, tensors and collections
    /// - [`Error::UnsupportedType`] for tensors whose shape and buffer
    ///   disagree
    ///
    /// # Example
    ///
    /// ```rust
    /// use trueno_track::{MetricValue, Value};
    ///
    /// let value = MetricValue::from(vec![0.25f32, 0.5]).normalize()?;
    /// assert!(matches!(value, Value::Array(_)));
    /// # Ok::<(), trueno_track::Error>(())
    /// ```
    pub fn normalize(self) -> Result<Value> {
        match self {
            Self::Scalar(scalar) => Ok(Value::Scalar(scalar)),
            Self::Array(array) => non_empty(array),
            Self::Tensor(tensor) => non_empty(tensor.into_row_major()?),
            Self::List(values) => collect_list(values).map(Value::Array),
        }
    }
}

impl From<Scalar> for MetricValue {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<ArrayValue> for MetricValue {
    fn from(value: ArrayValue) -> Self {
        Self::Array(value)
    }
}

impl From<Tensor> for MetricValue {
    fn from(value: Tensor) -> Self {
        Self::Tensor(value)
    }
}

impl From<Vec<Scalar>> for MetricValue {
    fn from(values: Vec<Scalar>) -> Self {
        Self::List(values)
    }
}

macro_rules! metric_from_scalar {
    ($($ty:ty),* $(,)?) => {$(
        impl From<$ty> for MetricValue {
            fn from(value: $ty) -> Self {
                Self::Scalar(Scalar::from(value))
            }
        }
    )*};
}

metric_from_scalar! {
    bool,
    i32,
    f32,
    &str,
    String,
    NaiveDate,
    DateTime<Utc>,
}

macro_rules! metric_from_vec {
    ($($ty:ty),* $(,)?) => {$(
        impl From<Vec<$ty>> for MetricValue {
            fn from(values: Vec<$ty>) -> Self {
                Self::Array(ArrayValue::from(values))
            }
        }
    )*};
}

metric_from_vec! {
    bool,
    i8,
    i16,
    i32,
    i64,
    u16,
    u32,
    u64,
    f32,
    f64,
    String,
    Vec<u8>,
    NaiveDate,
    DateTime<Utc>,
}

/// Canonical measurement form: what normalization produces and stores hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Single scalar cell.
    Scalar(Scalar),
    /// One-dimensional array cell.
    Array(ArrayValue),
}

fn non_empty(array: ArrayValue) -> Result<Value> {
    if array.is_empty() {
        return Err(Error::EmptyValue);
    }
    Ok(Value::Array(array))
}

/// Collects a homogeneous scalar collection into the default-width array
/// of its element kind. Single pass: the first element seeds the variant,
/// every later element must match it.
fn collect_list(values: Vec<Scalar>) -> Result<ArrayValue> {
    let mut out: Option<ArrayValue> = None;
    for value in values {
        match (&mut out, value) {
            (None, Scalar::Bool(v)) => out = Some(ArrayValue::Bool(vec![v])),
            (None, Scalar::Int(v)) => out = Some(ArrayValue::Int32(vec![v])),
            (None, Scalar::Float(v)) => out = Some(ArrayValue::Float32(vec![v])),
            (None, Scalar::Text(v)) => out = Some(ArrayValue::Text(vec![v])),
            (None, Scalar::Bytes(v)) => out = Some(ArrayValue::Bytes(vec![v])),
            (None, Scalar::Date(v)) => out = Some(ArrayValue::Date(vec![v])),
            (None, Scalar::DateTime(v)) => out = Some(ArrayValue::DateTime(vec![v])),
            (Some(ArrayValue::Bool(items)), Scalar::Bool(v)) => items.push(v),
            (Some(ArrayValue::Int32(items)), Scalar::Int(v)) => items.push(v),
            (Some(ArrayValue::Float32(items)), Scalar::Float(v)) => items.push(v),
            (Some(ArrayValue::Text(items)), Scalar::Text(v)) => items.push(v),
            (Some(ArrayValue::Bytes(items)), Scalar::Bytes(v)) => items.push(v),
            (Some(ArrayValue::Date(items)), Scalar::Date(v)) => items.push(v),
            (Some(ArrayValue::DateTime(items)), Scalar::DateTime(v)) => items.push(v),
            (Some(_), _) => return Err(Error::MixedElementTypes),
        }
    }
    out.ok_or(Error::EmptyValue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn scalar_passes_through() {
        let value = MetricValue::from(42i32).normalize().unwrap();
        assert_eq!(value, Value::Scalar(Scalar::Int(42)));
    }

    #[test]
    fn str_becomes_text_scalar() {
        let value = MetricValue::from("warmup").normalize().unwrap();
        assert_eq!(value, Value::Scalar(Scalar::Text("warmup".to_string())));
    }

    #[test]
    fn typed_vec_keeps_exact_width() {
        let value = MetricValue::from(vec![1i64, 2, 3]).normalize().unwrap();
        assert_eq!(value, Value::Array(ArrayValue::Int64(vec![1, 2, 3])));
    }

    #[test]
    fn list_collects_default_width() {
        let list = vec![Scalar::Float(0.5), Scalar::Float(0.25)];
        let value = MetricValue::from(list).normalize().unwrap();
        assert_eq!(value, Value::Array(ArrayValue::Float32(vec![0.5, 0.25])));
    }

    #[test]
    fn mixed_list_is_rejected() {
        let list = vec![Scalar::Int(1), Scalar::Float(2.0)];
        let err = MetricValue::from(list).normalize().unwrap_err();
        assert!(matches!(err, Error::MixedElementTypes));
    }

    #[test]
    fn empty_list_is_rejected() {
        let err = MetricValue::List(Vec::new()).normalize().unwrap_err();
        assert!(matches!(err, Error::EmptyValue));
    }

    #[test]
    fn empty_array_is_rejected() {
        let err = MetricValue::from(Vec::<f64>::new()).normalize().unwrap_err();
        assert!(matches!(err, Error::EmptyValue));
    }

    #[test]
    fn rank_two_tensor_is_rejected() {
        let tensor = Tensor::new(vec![1.0f32, 2.0, 3.0, 4.0], [2, 2]);
        let err = MetricValue::from(tensor).normalize().unwrap_err();
        assert!(matches!(err, Error::Shape { ndim: 2 }));
    }

    #[test]
    fn rank_one_tensor_materializes() {
        let tensor = Tensor::new(vec![1u8, 2, 3], [3]);
        let value = MetricValue::from(tensor).normalize().unwrap();
        assert_eq!(value, Value::Array(ArrayValue::UInt8(vec![1, 2, 3])));
    }

    #[test]
    fn rank_zero_tensor_is_a_single_element_array() {
        let tensor = Tensor::new(vec![0.75f64], Vec::new());
        let value = MetricValue::from(tensor).normalize().unwrap();
        assert_eq!(value, Value::Array(ArrayValue::Float64(vec![0.75])));
    }

    #[test]
    fn lying_tensor_shape_is_rejected() {
        let tensor = Tensor::new(vec![1i32, 2, 3], [7]);
        let err = MetricValue::from(tensor).normalize().unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)));
    }

    #[test]
    fn empty_tensor_is_rejected() {
        let tensor = Tensor::new(Vec::<f32>::new(), [0]);
        let err = MetricValue::from(tensor).normalize().unwrap_err();
        assert!(matches!(err, Error::EmptyValue));
    }

    #[test]
    fn dates_round_trip_through_lists() {
        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let value = MetricValue::from(vec![Scalar::Date(day)])
            .normalize()
            .unwrap();
        assert_eq!(value, Value::Array(ArrayValue::Date(vec![day])));
    }
}
