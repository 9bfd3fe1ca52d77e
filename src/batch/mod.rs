//! Batched concurrent dispatch.
//!
//! Work items are split into contiguous batches. Every item of a batch is in
//! flight at the same time; batches run one after another, so the batch size is
//! the concurrency ceiling for the whole run.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ConcurrencyMode`] | Preset or custom batch size |
//! | [`partition`] | Contiguous chunking of the input |
//! | [`BatchExecutor`] | Runs batches with a continue/abort failure policy |
//! | [`ResultRecord`] | Per-item outcome carrying its input index |

mod executor;
mod plan;

pub use executor::{
    BatchExecutor, BatchExecutorConfig, ItemOutcome, ResultRecord, RunReport, RunStats,
};
pub use plan::{batch_count, partition, ConcurrencyMode, MAX_CUSTOM_BATCH_SIZE};
