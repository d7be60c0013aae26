//! Storage abstraction for experiment tables
//!
//! [`SchemaStore`] is the seam between the tracker and a concrete
//! backend. The tracker only ever speaks typed columns and rows through
//! this trait; SQL or wire-protocol concerns live entirely behind it.
//!
//! # Example
//!
//! ```rust,no_run
//! use trueno_track::store::{MemoryTableStore, SchemaStore};
//! use trueno_track::schema::base_schema;
//!
//! # async fn example() -> trueno_track::Result<()> {
//! let store = MemoryTableStore::new();
//! store.create_table("mnist_run", &base_schema()).await?;
//! assert_eq!(store.list_tables().await?, vec!["mnist_run".to_string()]);
//! # Ok(())
//! # }
//! ```

mod memory;

pub use memory::{MemoryTableStore, StoredRow};

use std::collections::BTreeMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::Column;
use crate::value::Value;

/// Result alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures reported by a [`SchemaStore`] backend.
///
/// The variants are typed so callers can branch on the condition
/// instead of parsing backend message strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The table to create already exists.
    #[error("table `{0}` already exists")]
    AlreadyExists(String),

    /// The addressed table does not exist.
    #[error("table `{0}` does not exist")]
    NotFound(String),

    /// An insert named a column absent from the table schema.
    ///
    /// Carries the first missing column in statement order. This is the
    /// one recoverable store error: adding the column and retrying the
    /// insert is expected to succeed.
    #[error("no such column `{0}`")]
    MissingColumn(String),

    /// Any other backend failure.
    #[error("backend failure: {0}")]
    Backend(String),
}

/// One experiment row on its way to the store.
///
/// `step` and `phase` identify the measurement, `time` is the optional
/// ingestion timestamp (a backend fills in its own clock when absent)
/// and `values` holds the metric cells keyed by column name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    step: u32,
    phase: String,
    time: Option<DateTime<Utc>>,
    values: BTreeMap<String, Value>,
}

impl Row {
    /// Creates an empty row for the given step and phase.
    pub fn new(step: u32, phase: impl Into<String>) -> Self {
        Self {
            step,
            phase: phase.into(),
            time: None,
            values: BTreeMap::new(),
        }
    }

    /// Pins the ingestion timestamp instead of leaving it to the backend.
    #[must_use]
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    /// Sets a metric cell, replacing any previous value for the column.
    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        self.values.insert(column.into(), value);
    }

    /// Step counter of the measurement.
    #[must_use]
    pub const fn step(&self) -> u32 {
        self.step
    }

    /// Phase label of the measurement.
    #[must_use]
    pub fn phase(&self) -> &str {
        &self.phase
    }

    /// Pinned ingestion timestamp, if any.
    #[must_use]
    pub const fn time(&self) -> Option<DateTime<Utc>> {
        self.time
    }

    /// Metric cells keyed by column name.
    #[must_use]
    pub const fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Looks up one metric cell.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Metric column names of this row, in sorted order.
    ///
    /// Rows with equal signatures can share one insert statement.
    #[must_use]
    pub fn signature(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    pub(crate) fn into_parts(self) -> (u32, String, Option<DateTime<Utc>>, BTreeMap<String, Value>) {
        (self.step, self.phase, self.time, self.values)
    }
}

/// Storage backend for experiment tables, using async fn in traits
/// (Rust 1.75+).
///
/// Implementations must be safe to share across tasks; all methods take
/// `&self` and the tracker calls them concurrently.
pub trait SchemaStore: Send + Sync {
    /// Creates `table` with the given columns.
    ///
    /// # Errors
    ///
    /// [`StoreError::AlreadyExists`] when the table is already present.
    fn create_table(
        &self,
        table: &str,
        columns: &[Column],
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Drops `table` and everything in it.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when the table does not exist.
    fn drop_table(&self, table: &str) -> impl Future<Output = StoreResult<()>> + Send;

    /// Lists all table names, in a deterministic order.
    fn list_tables(&self) -> impl Future<Output = StoreResult<Vec<String>>> + Send;

    /// Returns the current columns of `table`, in schema order.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when the table does not exist.
    fn describe_table(&self, table: &str) -> impl Future<Output = StoreResult<Vec<Column>>> + Send;

    /// Appends one column to the schema of `table`.
    ///
    /// Not idempotent: adding a column that already exists is a backend
    /// failure, not a no-op.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when the table does not exist,
    /// [`StoreError::Backend`] when the column is already present.
    fn alter_table(
        &self,
        table: &str,
        column: &Column,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Inserts rows into `table`, all-or-nothing.
    ///
    /// `columns` names the metric columns of the statement in caller
    /// order; the base columns (`time`, `step`, `phase`) are implicit in
    /// every insert. Each row must carry exactly the cells named by
    /// `columns`. On success every row is durably written; on error none
    /// are.
    ///
    /// # Errors
    ///
    /// [`StoreError::MissingColumn`] with the first column in `columns`
    /// order that the table schema lacks, [`StoreError::NotFound`] when
    /// the table does not exist, [`StoreError::Backend`] for cell type
    /// mismatches and rows that disagree with `columns`.
    fn insert(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Row],
    ) -> impl Future<Output = StoreResult<()>> + Send;
}
