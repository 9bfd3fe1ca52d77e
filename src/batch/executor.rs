//! Batch executor: batches run strictly in order, items within a batch run concurrently.

use super::plan::partition;
use crate::classify::{ErrorRecord, FailurePolicy};
use crate::transport::TransportError;
use crate::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Outcome of one work item, tagged with its input position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub index: usize,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    Ok(Value),
    Err(ErrorRecord),
}

impl ResultRecord {
    pub fn ok(index: usize, payload: Value) -> Self {
        Self {
            index,
            outcome: ItemOutcome::Ok(payload),
        }
    }

    pub fn err(index: usize, error: ErrorRecord) -> Self {
        Self {
            index,
            outcome: ItemOutcome::Err(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, ItemOutcome::Ok(_))
    }

    pub fn payload(&self) -> Option<&Value> {
        match &self.outcome {
            ItemOutcome::Ok(v) => Some(v),
            ItemOutcome::Err(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorRecord> {
        match &self.outcome {
            ItemOutcome::Err(e) => Some(e),
            ItemOutcome::Ok(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub batches: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl RunStats {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.total() as f64
        }
    }
}

/// Results of a completed run, ordered by input position.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub results: Vec<ResultRecord>,
    pub stats: RunStats,
}

impl RunReport {
    pub fn into_results(self) -> Vec<ResultRecord> {
        self.results
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchExecutorConfig {
    pub batch_size: usize,
    pub policy: FailurePolicy,
}

impl Default for BatchExecutorConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            policy: FailurePolicy::Abort,
        }
    }
}

impl BatchExecutorConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }
}

pub struct BatchExecutor {
    config: BatchExecutorConfig,
}

impl BatchExecutor {
    pub fn new() -> Self {
        Self {
            config: BatchExecutorConfig::default(),
        }
    }
    pub fn with_config(config: BatchExecutorConfig) -> Self {
        Self { config }
    }
    pub fn config(&self) -> &BatchExecutorConfig {
        &self.config
    }

    /// Run `call` over every item.
    ///
    /// Each batch is a barrier: the next batch starts only after every request of
    /// the current one has settled. Results land at their input position whatever
    /// order they complete in. Under [`FailurePolicy::Abort`] the first failure
    /// returns immediately; the remaining futures of that batch are dropped
    /// (which cancels their requests) and no later batch is started.
    pub async fn execute<T, F, Fut>(&self, items: Vec<T>, call: F) -> Result<RunReport>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = std::result::Result<Value, TransportError>>,
    {
        let start = Instant::now();
        let total = items.len();
        let batches = partition(items.into_iter().enumerate().collect(), self.config.batch_size);

        let mut stats = RunStats {
            batches: batches.len(),
            ..RunStats::default()
        };
        let mut results = Vec::with_capacity(total);

        for (batch_no, batch) in batches.into_iter().enumerate() {
            let first = batch.first().map(|(index, _)| *index).unwrap_or_default();
            let mut slots: Vec<Option<ResultRecord>> = (0..batch.len()).map(|_| None).collect();
            debug!(batch = batch_no, first_index = first, size = batch.len(), "dispatching batch");

            let mut in_flight: FuturesUnordered<_> = batch
                .into_iter()
                .map(|(index, item)| {
                    let fut = call(item);
                    async move { (index, fut.await) }
                })
                .collect();

            while let Some((index, outcome)) = in_flight.next().await {
                let record = match outcome {
                    Ok(payload) => {
                        stats.succeeded += 1;
                        ResultRecord::ok(index, payload)
                    }
                    Err(err) => match self.config.policy.apply(index, &err) {
                        Ok(error) => {
                            warn!(
                                index,
                                status = %error.status_code,
                                class = %error.class,
                                "item failed; continuing"
                            );
                            stats.failed += 1;
                            ResultRecord::err(index, error)
                        }
                        Err(abort) => {
                            warn!(index, error = %err, "item failed; aborting run");
                            return Err(abort);
                        }
                    },
                };
                slots[index - first] = Some(record);
            }

            results.extend(slots.into_iter().flatten());
            debug!(batch = batch_no, settled = results.len(), "batch settled");
        }

        stats.elapsed = start.elapsed();
        Ok(RunReport { results, stats })
    }
}

impl Default for BatchExecutor {
    fn default() -> Self {
        Self::new()
    }
}
