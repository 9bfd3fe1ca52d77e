//! Concurrency presets and batch partitioning.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};

/// Upper bound for a custom batch size.
pub const MAX_CUSTOM_BATCH_SIZE: u32 = 20;

/// How many requests may be in flight at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ConcurrencyMode {
    #[default]
    Single,
    Low,
    Medium,
    High,
    Custom {
        #[serde(default = "default_custom_requests")]
        requests: u32,
    },
}

fn default_custom_requests() -> u32 {
    5
}

impl ConcurrencyMode {
    pub fn custom(requests: u32) -> Self {
        ConcurrencyMode::Custom { requests }
    }

    /// Batch size for this mode; custom values must lie in `[1, 20]`.
    pub fn batch_size(&self) -> Result<usize> {
        let size = match self {
            ConcurrencyMode::Single => 1,
            ConcurrencyMode::Low => 2,
            ConcurrencyMode::Medium => 6,
            ConcurrencyMode::High => 10,
            ConcurrencyMode::Custom { requests } => {
                if !(1..=MAX_CUSTOM_BATCH_SIZE).contains(requests) {
                    return Err(Error::configuration_with_context(
                        "custom concurrency out of range",
                        ErrorContext::new()
                            .with_field_path("run.concurrency.requests")
                            .with_details(format!(
                                "expected 1..={}, got {}",
                                MAX_CUSTOM_BATCH_SIZE, requests
                            ))
                            .with_source("concurrency_mode"),
                    ));
                }
                *requests
            }
        };
        Ok(size as usize)
    }
}

/// Split `items` into contiguous batches of `batch_size`; the last one may be shorter.
pub fn partition<T>(items: Vec<T>, batch_size: usize) -> Vec<Vec<T>> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(batch_count(items.len(), batch_size));
    let mut current = Vec::with_capacity(batch_size);
    for item in items {
        current.push(item);
        if current.len() == batch_size {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(batch_size)));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// `ceil(len / batch_size)`
pub fn batch_count(len: usize, batch_size: usize) -> usize {
    len.div_ceil(batch_size.max(1))
}
