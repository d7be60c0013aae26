//! Experiment tracker facade
//!
//! [`Tracker`] owns one experiment table and is the single entry point
//! for measurements: [`trace`](Tracker::trace) takes a raw value,
//! normalizes it and either writes it immediately or merges it into the
//! in-memory batch until a flush interval fires. [`Manager`] covers the
//! administrative side: listing and removing experiments.
//!
//! A tracker is either immediate or batched, decided once at connect
//! time. Batched trackers keep their buffer and interval counters
//! behind one async mutex, so the flush decision, the flush itself and
//! the merge of the triggering measurement happen atomically even when
//! many tasks trace concurrently.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::batch::{FlushPolicy, PendingBatch};
use crate::error::{Error, Result};
use crate::schema::{base_schema, Column};
use crate::store::{Row, SchemaStore, StoreError};
use crate::value::{MetricValue, Value};
use crate::writer::WriteCoordinator;

#[derive(Debug)]
struct BatchState {
    buffer: PendingBatch,
    last_step: u32,
    last_flush: Instant,
}

#[derive(Debug)]
enum Mode {
    Immediate,
    Batched {
        policy: FlushPolicy,
        state: Mutex<BatchState>,
    },
}

/// Handle to one experiment table.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
///
/// # Example
///
/// ```rust,no_run
/// use trueno_track::{MemoryTableStore, TrackerBuilder};
///
/// # async fn example() -> trueno_track::Result<()> {
/// let tracker = TrackerBuilder::new("mnist_baseline")
///     .flush_every_steps(100)
///     .connect(MemoryTableStore::new())
///     .await?;
///
/// tracker.trace("loss", 0.734_f32, 0, "train").await?;
/// tracker.trace("loss", 0.729_f32, 1, "train").await?;
/// tracker.flush().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Tracker<S> {
    writer: WriteCoordinator<S>,
    mode: Mode,
}

impl<S> Tracker<S> {
    /// Name of the experiment, which is also its table name.
    #[must_use]
    pub fn experiment(&self) -> &str {
        self.writer.table()
    }

    /// The store this tracker writes to.
    #[must_use]
    pub const fn store(&self) -> &S {
        self.writer.store()
    }

    /// Whether measurements accumulate in memory before being written.
    #[must_use]
    pub const fn is_batching(&self) -> bool {
        matches!(self.mode, Mode::Batched { .. })
    }
}

impl<S: SchemaStore> Tracker<S> {
    /// Records one measurement.
    ///
    /// The value is normalized first, so shape and homogeneity problems
    /// surface here and never reach the store. In immediate mode the
    /// row is written before this returns; in batched mode it merges
    /// into the buffer and the store is only touched when an interval
    /// fires.
    ///
    /// # Errors
    ///
    /// Normalization errors ([`Error::Shape`],
    /// [`Error::MixedElementTypes`], [`Error::EmptyValue`],
    /// [`Error::UnsupportedType`]) and, when a write happens, any error
    /// of the flush path.
    pub async fn trace(
        &self,
        metric: impl Into<String>,
        value: impl Into<MetricValue>,
        step: u32,
        phase: &str,
    ) -> Result<()> {
        let cell = (metric.into(), value.into().normalize()?);
        self.dispatch(vec![cell], step, phase).await
    }

    /// Records several measurements that share one step and phase.
    ///
    /// All values are normalized before anything is buffered or
    /// written: one bad value rejects the whole call. Tracing an empty
    /// set is a no-op.
    ///
    /// # Errors
    ///
    /// Same as [`trace`](Self::trace).
    pub async fn multi_trace<I, N, V>(&self, metrics: I, step: u32, phase: &str) -> Result<()>
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<MetricValue>,
    {
        let mut cells = Vec::new();
        for (metric, value) in metrics {
            cells.push((metric.into(), value.into().normalize()?));
        }
        if cells.is_empty() {
            return Ok(());
        }
        self.dispatch(cells, step, phase).await
    }

    async fn dispatch(&self, cells: Vec<(String, Value)>, step: u32, phase: &str) -> Result<()> {
        match &self.mode {
            Mode::Immediate => {
                let mut row = Row::new(step, phase);
                for (metric, value) in cells {
                    row.set(metric, value);
                }
                let columns = row.signature();
                self.writer
                    .write_rows(&columns, std::slice::from_ref(&row))
                    .await
            }
            Mode::Batched { policy, state } => {
                let mut state = state.lock().await;
                if policy.is_due(step, state.last_step, state.last_flush) {
                    // Flush before merging: the triggering measurement
                    // opens the next batch. On failure the counters stay
                    // put and the measurement is not recorded.
                    self.flush_locked(&mut state).await?;
                    state.last_step = step;
                    state.last_flush = Instant::now();
                }
                state.buffer.merge(step, phase, cells, Utc::now());
                Ok(())
            }
        }
    }

    async fn flush_locked(&self, state: &mut BatchState) -> Result<()> {
        if state.buffer.is_empty() {
            return Ok(());
        }
        let rows = state.buffer.take_rows();
        match self.writer.write_all(rows).await {
            Ok(written) => {
                debug!(table = %self.writer.table(), rows = written, "flushed accumulated measurements");
                Ok(())
            }
            Err((err, unwritten)) => {
                warn!(
                    table = %self.writer.table(),
                    rows = unwritten.len(),
                    error = %err,
                    "flush failed, measurements re-queued"
                );
                state.buffer.restore(unwritten);
                Err(err)
            }
        }
    }

    /// Unconditionally flushes buffered measurements.
    ///
    /// Does not advance the interval counters: an explicit flush is a
    /// checkpoint, not a schedule event. A no-op in immediate mode and
    /// on an empty buffer.
    ///
    /// # Errors
    ///
    /// Store and schema evolution errors of the write path. Rows that
    /// could not be written stay buffered for the next attempt.
    pub async fn flush(&self) -> Result<()> {
        match &self.mode {
            Mode::Immediate => Ok(()),
            Mode::Batched { state, .. } => {
                let mut state = state.lock().await;
                self.flush_locked(&mut state).await
            }
        }
    }

    /// Number of buffered (step, phase) rows not yet written.
    ///
    /// Always zero in immediate mode.
    pub async fn pending_rows(&self) -> usize {
        match &self.mode {
            Mode::Immediate => 0,
            Mode::Batched { state, .. } => state.lock().await.buffer.row_count(),
        }
    }

    /// Column names of the experiment table, in schema order.
    ///
    /// A fresh experiment reports exactly the base columns (`time`,
    /// `step`, `phase`); metric columns follow in the order schema
    /// evolution added them.
    ///
    /// # Errors
    ///
    /// Store errors from describing the table.
    pub async fn metrics(&self) -> Result<Vec<String>> {
        let columns = self.writer.describe().await?;
        Ok(columns.iter().map(Column::name).map(String::from).collect())
    }
}

impl<S> fmt::Display for Tracker<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tracker:{}", self.writer.table())
    }
}

/// Builder for [`Tracker`] connections.
///
/// Without a flush interval the tracker writes every measurement
/// immediately. Setting [`flush_every_steps`](Self::flush_every_steps),
/// [`flush_every`](Self::flush_every) or both switches it to batched
/// mode, flushing when the first configured interval fires.
#[derive(Debug, Clone)]
pub struct TrackerBuilder {
    experiment: String,
    step_interval: Option<u32>,
    time_interval: Option<Duration>,
    exist_ok: bool,
    op_timeout: Option<Duration>,
}

impl TrackerBuilder {
    /// Creates a builder for the named experiment.
    pub fn new(experiment: impl Into<String>) -> Self {
        Self {
            experiment: experiment.into(),
            step_interval: None,
            time_interval: None,
            exist_ok: false,
            op_timeout: None,
        }
    }

    /// Flushes once traced steps move this far past the last flush.
    #[must_use]
    pub fn flush_every_steps(mut self, steps: u32) -> Self {
        self.step_interval = Some(steps);
        self
    }

    /// Flushes once this much wall time has passed since the last flush.
    #[must_use]
    pub fn flush_every(mut self, interval: Duration) -> Self {
        self.time_interval = Some(interval);
        self
    }

    /// Attaches to an existing experiment table instead of failing.
    #[must_use]
    pub fn exist_ok(mut self, exist_ok: bool) -> Self {
        self.exist_ok = exist_ok;
        self
    }

    /// Bounds every store round-trip with a deadline.
    ///
    /// Exceeding it yields [`Error::Timeout`], the one retryable error.
    #[must_use]
    pub fn op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = Some(timeout);
        self
    }

    /// Connects to the store and ensures the experiment table exists.
    ///
    /// A fresh experiment gets the base schema (`time`, `step`,
    /// `phase`); metric columns appear later through schema evolution.
    ///
    /// # Errors
    ///
    /// [`Error::ExperimentExists`] when the table is already present
    /// and [`exist_ok`](Self::exist_ok) was not set, otherwise any
    /// store error from creating the table.
    pub async fn connect<S: SchemaStore>(self, store: S) -> Result<Tracker<S>> {
        let policy = FlushPolicy {
            step_interval: self.step_interval,
            time_interval: self.time_interval,
        };
        let writer = WriteCoordinator::new(store, self.experiment, self.op_timeout);
        match writer.create_table(&base_schema()).await {
            Ok(()) => debug!(table = %writer.table(), "experiment table created"),
            Err(Error::Store(StoreError::AlreadyExists(table))) => {
                if self.exist_ok {
                    debug!(table = %table, "attaching to existing experiment");
                } else {
                    return Err(Error::ExperimentExists(table));
                }
            }
            Err(other) => return Err(other),
        }
        let mode = if policy.enabled() {
            Mode::Batched {
                policy,
                state: Mutex::new(BatchState {
                    buffer: PendingBatch::new(),
                    last_step: 0,
                    last_flush: Instant::now(),
                }),
            }
        } else {
            Mode::Immediate
        };
        Ok(Tracker { writer, mode })
    }
}

/// Administrative operations over the experiments of one store.
///
/// # Example
///
/// ```rust,no_run
/// use trueno_track::{Manager, MemoryTableStore};
///
/// # async fn example() -> trueno_track::Result<()> {
/// let manager = Manager::new(MemoryTableStore::new());
/// for name in manager.list_experiments().await? {
///     manager.remove_experiment(&name).await?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Manager<S> {
    store: S,
}

impl<S> Manager<S> {
    /// Wraps a store handle for administration.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }
}

impl<S: SchemaStore> Manager<S> {
    /// Names of all experiments in the store.
    ///
    /// # Errors
    ///
    /// Store errors from listing tables.
    pub async fn list_experiments(&self) -> Result<Vec<String>> {
        Ok(self.store.list_tables().await?)
    }

    /// Drops an experiment table and every measurement in it.
    ///
    /// # Errors
    ///
    /// [`Error::ExperimentNotFound`] when no such experiment exists.
    pub async fn remove_experiment(&self, experiment: &str) -> Result<()> {
        match self.store.drop_table(experiment).await {
            Ok(()) => {
                debug!(table = %experiment, "experiment removed");
                Ok(())
            }
            Err(StoreError::NotFound(table)) => Err(Error::ExperimentNotFound(table)),
            Err(other) => Err(other.into()),
        }
    }
}
