//! Insert coordination and schema evolution
//!
//! The write coordinator turns rows into insert statements. Rows are
//! grouped by metric column signature so each statement names exactly
//! one column set, and a missing-column response from the store triggers
//! a bounded alter-and-retry loop instead of failing the write.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::schema::Column;
use crate::store::{Row, SchemaStore, StoreError, StoreResult};

/// Groups rows by their metric column signature.
///
/// `BTreeMap` keys keep group order deterministic, so multi-group
/// flushes hit the store in the same sequence every time.
pub(crate) fn group_by_signature(rows: Vec<Row>) -> BTreeMap<Vec<String>, Vec<Row>> {
    let mut groups: BTreeMap<Vec<String>, Vec<Row>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.signature()).or_default().push(row);
    }
    groups
}

/// Issues schema and insert operations against one experiment table.
#[derive(Debug)]
pub(crate) struct WriteCoordinator<S> {
    store: S,
    table: String,
    op_timeout: Option<Duration>,
}

impl<S> WriteCoordinator<S> {
    pub(crate) fn new(store: S, table: String, op_timeout: Option<Duration>) -> Self {
        Self {
            store,
            table,
            op_timeout,
        }
    }

    pub(crate) fn table(&self) -> &str {
        &self.table
    }

    pub(crate) const fn store(&self) -> &S {
        &self.store
    }
}

impl<S: SchemaStore> WriteCoordinator<S> {
    /// Applies the configured deadline to one store round-trip.
    async fn bound<T>(&self, op: impl Future<Output = StoreResult<T>> + Send) -> Result<T> {
        let outcome = match self.op_timeout {
            Some(limit) => tokio::time::timeout(limit, op)
                .await
                .map_err(|_| Error::Timeout { limit })?,
            None => op.await,
        };
        outcome.map_err(Error::from)
    }

    pub(crate) async fn create_table(&self, columns: &[Column]) -> Result<()> {
        self.bound(self.store.create_table(&self.table, columns))
            .await
    }

    pub(crate) async fn describe(&self) -> Result<Vec<Column>> {
        self.bound(self.store.describe_table(&self.table)).await
    }

    /// Inserts one signature group, evolving the schema as needed.
    ///
    /// Each missing-column response adds that column, typed after its
    /// value in the group's first row, then retries the whole insert.
    /// Every named column gets at most one alter, so N new columns cost
    /// N alter-and-retry rounds and the loop is bounded by the
    /// statement's column count.
    pub(crate) async fn write_rows(&self, columns: &[String], rows: &[Row]) -> Result<()> {
        let mut altered: HashSet<String> = HashSet::new();
        let mut attempts = 0usize;
        loop {
            let outcome = self
                .bound(self.store.insert(&self.table, columns, rows))
                .await;
            let column = match outcome {
                Ok(()) => {
                    debug!(
                        table = %self.table,
                        rows = rows.len(),
                        columns = columns.len(),
                        "insert committed"
                    );
                    return Ok(());
                }
                Err(Error::Store(StoreError::MissingColumn(column))) => column,
                Err(other) => return Err(other),
            };
            if !altered.insert(column.clone()) {
                warn!(table = %self.table, column = %column, attempts, "store kept reporting an already added column");
                return Err(Error::SchemaEvolution { column, attempts });
            }
            let Some(value) = rows.first().and_then(|row| row.get(&column)) else {
                warn!(table = %self.table, column = %column, "store reported a column absent from the batch");
                return Err(Error::SchemaEvolution { column, attempts });
            };
            let column_type = value.column_type();
            info!(table = %self.table, column = %column, %column_type, "adding column to experiment schema");
            self.bound(
                self.store
                    .alter_table(&self.table, &Column::new(column.clone(), column_type)),
            )
            .await?;
            attempts += 1;
        }
    }

    /// Flushes every signature group of `rows`.
    ///
    /// Groups are written in deterministic order. On the first failure
    /// the failed group and every unattempted one come back to the
    /// caller; groups already committed stay committed.
    pub(crate) async fn write_all(
        &self,
        rows: Vec<Row>,
    ) -> std::result::Result<usize, (Error, Vec<Row>)> {
        let mut remaining = group_by_signature(rows);
        let mut written = 0usize;
        while let Some((columns, group)) = remaining.pop_first() {
            match self.write_rows(&columns, &group).await {
                Ok(()) => written += group.len(),
                Err(err) => {
                    let mut unwritten = group;
                    unwritten.extend(remaining.into_values().flatten());
                    return Err((err, unwritten));
                }
            }
        }
        Ok(written)
    }
}
