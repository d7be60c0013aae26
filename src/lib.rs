//! # Trueno-Track: Experiment Metrics Tracker
//!
//! Trueno-Track records machine learning experiment metrics into a
//! columnar time-series store. Every experiment is one table; every
//! measurement becomes a typed cell in a (step, phase) row. New metric
//! names grow the table through bounded schema evolution instead of
//! failing the write.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Muda elimination**: batched mode merges measurements in memory
//!   and writes one insert per column signature
//! - **Poka-Yoke safety**: values are normalized and type-mapped before
//!   they can reach a store, so malformed data fails fast and locally
//! - **Jidoka**: store failures are typed; the one recoverable
//!   condition (a missing column) is healed in place, everything else
//!   stops the line
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use trueno_track::{MemoryTableStore, TrackerBuilder};
//!
//! # async fn example() -> trueno_track::Result<()> {
//! let tracker = TrackerBuilder::new("mnist_baseline")
//!     .flush_every_steps(100)
//!     .connect(MemoryTableStore::new())
//!     .await?;
//!
//! for step in 0..1_000 {
//!     let loss = 1.0 / (step + 1) as f32;
//!     tracker.trace("loss", loss, step, "train").await?;
//! }
//! tracker.flush().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod batch;
pub mod error;
pub mod schema;
pub mod store;
pub mod tracker;
pub mod value;
mod writer;

pub use error::{Error, Result};
pub use schema::{Column, ColumnType, ScalarType};
pub use store::{MemoryTableStore, Row, SchemaStore, StoreError, StoreResult, StoredRow};
pub use tracker::{Manager, Tracker, TrackerBuilder};
pub use value::{ArrayValue, MetricValue, Scalar, Tensor, Value};
