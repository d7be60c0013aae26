//! In-memory table store backed by `DashMap`.
//!
//! The default backend for tests and local runs. Data is lost on process
//! restart; for durable storage implement [`SchemaStore`] over a real
//! columnar server.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use super::{Row, SchemaStore, StoreError, StoreResult};
use crate::schema::{Column, ColumnType};
use crate::value::Value;

/// Fully materialized row, as the store keeps it.
///
/// Unlike [`Row`], the ingestion time is always present: the store fills
/// in its own clock for rows that arrive without one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRow {
    time: DateTime<Utc>,
    step: u32,
    phase: String,
    values: BTreeMap<String, Value>,
}

impl StoredRow {
    /// Ingestion timestamp of the row.
    #[must_use]
    pub const fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Step counter of the row.
    #[must_use]
    pub const fn step(&self) -> u32 {
        self.step
    }

    /// Phase label of the row.
    #[must_use]
    pub fn phase(&self) -> &str {
        &self.phase
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
}

#[derive(Debug)]
struct Table {
    columns: Vec<Column>,
    rows: Vec<StoredRow>,
}

/// In-memory [`SchemaStore`] using a lock-free concurrent hashmap.
///
/// Cloning is cheap and returns a handle to the same tables, the way
/// two connections address one server. Inserts are checked against the
/// declared schema, so type mismatches surface here just as they would
/// on a real backend.
///
/// # Example
///
/// ```rust
/// use trueno_track::store::{MemoryTableStore, SchemaStore};
/// use trueno_track::schema::base_schema;
///
/// # async fn example() -> trueno_track::Result<()> {
/// let store = MemoryTableStore::new();
/// store.create_table("run_a", &base_schema()).await?;
/// store.drop_table("run_a").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryTableStore {
    tables: Arc<DashMap<String, Table>>,
}

impl MemoryTableStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: Arc::new(DashMap::new()),
        }
    }

    /// Number of tables in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether the store holds no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Drops all tables.
    pub fn clear(&self) {
        self.tables.clear();
    }

    /// Snapshot of the rows of `table`, in insertion order.
    #[must_use]
    pub fn rows(&self, table: &str) -> Option<Vec<StoredRow>> {
        self.tables.get(table).map(|t| t.rows.clone())
    }

    /// Number of rows in `table`.
    #[must_use]
    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.tables.get(table).map(|t| t.rows.len())
    }

    /// Snapshot of the columns of `table`, in schema order.
    #[must_use]
    pub fn columns(&self, table: &str) -> Option<Vec<Column>> {
        self.tables.get(table).map(|t| t.columns.clone())
    }
}

impl Default for MemoryTableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaStore for MemoryTableStore {
    async fn create_table(&self, table: &str, columns: &[Column]) -> StoreResult<()> {
        let mut seen = HashSet::new();
        for column in columns {
            if !seen.insert(column.name()) {
                return Err(StoreError::Backend(format!(
                    "duplicate column `{}` in schema for `{table}`",
                    column.name()
                )));
            }
        }
        match self.tables.entry(table.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(StoreError::AlreadyExists(table.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Table {
                    columns: columns.to_vec(),
                    rows: Vec::new(),
                });
                Ok(())
            }
        }
    }

    async fn drop_table(&self, table: &str) -> StoreResult<()> {
        self.tables
            .remove(table)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(table.to_string()))
    }

    async fn list_tables(&self) -> StoreResult<Vec<String>> {
        let mut names: Vec<String> = self.tables.iter().map(|e| e.key().clone()).collect();
        names.sort_unstable();
        Ok(names)
    }

    async fn describe_table(&self, table: &str) -> StoreResult<Vec<Column>> {
        self.tables
            .get(table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| StoreError::NotFound(table.to_string()))
    }

    async fn alter_table(&self, table: &str, column: &Column) -> StoreResult<()> {
        let mut entry = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::NotFound(table.to_string()))?;
        if entry.columns.iter().any(|c| c.name() == column.name()) {
            return Err(StoreError::Backend(format!(
                "column `{}` already exists in `{table}`",
                column.name()
            )));
        }
        entry.columns.push(column.clone());
        Ok(())
    }

    async fn insert(&self, table: &str, columns: &[String], rows: &[Row]) -> StoreResult<()> {
        let mut entry = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::NotFound(table.to_string()))?;
        let Table {
            columns: schema,
            rows: stored,
        } = &mut *entry;

        let declared: HashMap<&str, ColumnType> = schema
            .iter()
            .map(|c| (c.name(), c.column_type()))
            .collect();
        for name in columns {
            if !declared.contains_key(name.as_str()) {
                return Err(StoreError::MissingColumn(name.clone()));
            }
        }

        // Validate every row before touching the table; errors leave it
        // untouched.
        let mut staged = Vec::with_capacity(rows.len());
        for row in rows {
            if row.values().len() != columns.len() {
                return Err(StoreError::Backend(format!(
                    "row at step {} carries {} cell(s) but the statement names {} column(s)",
                    row.step(),
                    row.values().len(),
                    columns.len()
                )));
            }
            let mut cells = BTreeMap::new();
            for name in columns {
                let Some(value) = row.get(name) else {
                    return Err(StoreError::Backend(format!(
                        "row at step {} is missing a value for column `{name}`",
                        row.step()
                    )));
                };
                let Some(&column_type) = declared.get(name.as_str()) else {
                    return Err(StoreError::MissingColumn(name.clone()));
                };
                let actual = value.column_type();
                if actual != column_type {
                    return Err(StoreError::Backend(format!(
                        "type mismatch for column `{name}`: declared {column_type}, got {actual}"
                    )));
                }
                cells.insert(name.clone(), value.clone());
            }
            staged.push(StoredRow {
                time: row.time().unwrap_or_else(Utc::now),
                step: row.step(),
                phase: row.phase().to_string(),
                values: cells,
            });
        }
        stored.extend(staged);
        Ok(())
    }
}
