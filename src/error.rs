//! Error types for Trueno-Track
//!
//! Toyota Way: clear error messages with actionable guidance (Respect for People)

use std::time::Duration;

use thiserror::Error;

use crate::store::StoreError;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trueno-Track error types
#[derive(Error, Debug)]
pub enum Error {
    /// A tensor with two or more dimensions was traced.
    #[error("arrays with more than one dimension are not supported (got {ndim} dimensions)")]
    Shape {
        /// Number of dimensions of the rejected tensor.
        ndim: usize,
    },

    /// A collection mixed elements of different scalar kinds.
    #[error("collections must contain values of the same scalar kind")]
    MixedElementTypes,

    /// An empty array or collection was traced; no element type can be derived.
    #[error("empty arrays and collections carry no element type")]
    EmptyValue,

    /// A value outside the supported scalar and array vocabulary.
    #[error("unsupported value: {0}")]
    UnsupportedType(String),

    /// The experiment's backing table already exists and `exist_ok` was not set.
    #[error("experiment `{0}` already exists")]
    ExperimentExists(String),

    /// The experiment's backing table does not exist.
    #[error("experiment `{0}` does not exist")]
    ExperimentNotFound(String),

    /// The store kept reporting missing columns after the retry budget ran out.
    #[error("schema evolution for column `{column}` gave up after {attempts} alter attempt(s)")]
    SchemaEvolution {
        /// Column the store last reported as missing.
        column: String,
        /// Alter-and-retry rounds performed before giving up.
        attempts: usize,
    },

    /// Any store failure other than a recoverable missing column.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A store round-trip exceeded the configured deadline.
    #[error("store operation exceeded the {limit:?} deadline")]
    Timeout {
        /// The deadline that was exceeded.
        limit: Duration,
    },
}

impl Error {
    /// Whether the failed operation may be retried as-is.
    ///
    /// Timeouts are transient. Every other variant is either a caller
    /// mistake caught during normalization or a fatal store condition.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
