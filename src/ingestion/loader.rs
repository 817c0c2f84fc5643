//! Batch loading: one spawned insert per batch, joined once at the end of a run.

use super::batch::Batch;
use crate::db::UserStore;
use crate::error::{LoaderError, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// An insert that has been submitted but not yet awaited.
pub struct PendingLoad {
    pub sequence: usize,
    pub rows: usize,
    handle: JoinHandle<Result<u64>>,
}

/// Submits batches against a shared store without waiting for them.
#[derive(Clone)]
pub struct BatchLoader {
    store: Arc<dyn UserStore>,
}

impl BatchLoader {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Spawn the insert for `batch` and return immediately. Must be called inside a tokio
    /// runtime. Failures only show up when the handle is joined.
    pub fn load(&self, batch: Batch) -> PendingLoad {
        let store = Arc::clone(&self.store);
        let sequence = batch.sequence;
        let rows = batch.len();

        debug!("Submitting batch {} ({} rows)", sequence, rows);
        let handle = tokio::spawn(async move { store.insert_batch(&batch.rows).await });

        PendingLoad {
            sequence,
            rows,
            handle,
        }
    }
}

/// Result of awaiting every pending load.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JoinOutcome {
    pub batches: usize,
    pub rows_inserted: u64,
    pub failed: usize,
    pub first_failure: Option<String>,
}

impl JoinOutcome {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Collapse into a single aggregated error when any batch failed.
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(LoaderError::BatchJoin {
            failed: self.failed,
            total: self.batches,
            first: self.first_failure.unwrap_or_default(),
        })
    }
}

/// Await every handle in submission order. A failing batch does not cancel the others.
pub async fn join_all(pending: Vec<PendingLoad>) -> JoinOutcome {
    let mut outcome = JoinOutcome {
        batches: pending.len(),
        ..JoinOutcome::default()
    };

    for load in pending {
        let failure = match load.handle.await {
            Ok(Ok(inserted)) => {
                outcome.rows_inserted += inserted;
                None
            }
            Ok(Err(e)) => Some(e.to_string()),
            Err(e) => Some(format!("insert task did not complete: {}", e)),
        };

        if let Some(message) = failure {
            debug!("Batch {} ({} rows) failed: {}", load.sequence, load.rows, message);
            outcome.failed += 1;
            outcome.first_failure.get_or_insert(message);
        }
    }

    outcome
}
