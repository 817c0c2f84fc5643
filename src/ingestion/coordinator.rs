//! Ingestion Coordinator - drives one run from the line stream to the age report
//!
//! Phases: `Reading -> Draining -> Reporting -> Done`, with `Failed` on a source I/O error.
//! Each run owns its accumulator and pending loads; nothing is shared between runs.

use super::batch::{Batch, BatchAccumulator};
use super::decoder::{decode, parse_header};
use super::loader::{join_all, BatchLoader, PendingLoad};
use super::path::HeaderPath;
use super::projector::project;
use super::source::{await_source, open_lines, ReadySignal, SourceLines};
use super::IngestionSummary;
use crate::db::UserStore;
use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncBufRead;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestionPhase {
    Reading,
    Draining,
    Reporting,
    Done,
    Failed,
}

pub struct IngestionCoordinator {
    run_id: String,
    store: Arc<dyn UserStore>,
    loader: BatchLoader,
    accumulator: BatchAccumulator,
    pending: Vec<PendingLoad>,
    header: Option<Vec<HeaderPath>>,
    phase: IngestionPhase,
    rows_processed: u64,
    rows_skipped: u64,
    rows_rejected: u64,
    tuples_submitted: u64,
    batches_submitted: usize,
}

impl IngestionCoordinator {
    pub fn new(store: Arc<dyn UserStore>, batch_size: usize) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            loader: BatchLoader::new(Arc::clone(&store)),
            store,
            accumulator: BatchAccumulator::new(batch_size),
            pending: Vec::new(),
            header: None,
            phase: IngestionPhase::Reading,
            rows_processed: 0,
            rows_skipped: 0,
            rows_rejected: 0,
            tuples_submitted: 0,
            batches_submitted: 0,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn phase(&self) -> IngestionPhase {
        self.phase
    }

    /// Wait for `path` to become available, then ingest it.
    pub async fn run_file(
        &mut self,
        path: &Path,
        signal: Option<ReadySignal>,
        poll_interval: Duration,
    ) -> Result<IngestionSummary> {
        await_source(path, signal, poll_interval).await;

        let lines = match open_lines(path).await {
            Ok(lines) => lines,
            Err(e) => {
                self.phase = IngestionPhase::Failed;
                error!(run_id = %self.run_id, "Failed to open {}: {}", path.display(), e);
                return Err(e);
            }
        };

        info!(run_id = %self.run_id, "Ingesting {}", path.display());
        self.run_lines(lines).await
    }

    /// Ingest every line of `reader`.
    pub async fn run<R>(&mut self, reader: R) -> Result<IngestionSummary>
    where
        R: AsyncBufRead + Unpin,
    {
        self.run_lines(SourceLines::new(reader)).await
    }

    async fn run_lines<R>(&mut self, mut lines: SourceLines<R>) -> Result<IngestionSummary>
    where
        R: AsyncBufRead + Unpin,
    {
        let started = Instant::now();
        self.phase = IngestionPhase::Reading;

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => self.accept_line(&line),
                Ok(None) => break,
                Err(e) => {
                    self.phase = IngestionPhase::Failed;
                    error!(run_id = %self.run_id, "Failed reading source stream: {}", e);
                    return Err(e.into());
                }
            }
        }

        self.phase = IngestionPhase::Draining;
        if let Some(batch) = self.accumulator.flush() {
            self.submit(batch);
        }

        let read_elapsed = started.elapsed();
        info!(
            run_id = %self.run_id,
            "Processed {} rows in {:.2} seconds.",
            self.rows_processed,
            read_elapsed.as_secs_f64()
        );

        self.phase = IngestionPhase::Reporting;
        let outcome = join_all(std::mem::take(&mut self.pending)).await;
        let outcome = match outcome.into_result() {
            Ok(outcome) => outcome,
            Err(e) => {
                self.phase = IngestionPhase::Done;
                error!(run_id = %self.run_id, "Error inserting records into the database: {}", e);
                return Err(e);
            }
        };
        info!(
            run_id = %self.run_id,
            "Successfully submitted {} batches ({} rows) into the database.",
            outcome.batches,
            outcome.rows_inserted
        );

        let report = match self.store.age_distribution().await {
            Ok(report) => report,
            Err(e) => {
                self.phase = IngestionPhase::Done;
                error!(run_id = %self.run_id, "Failed to build age report: {}", e);
                return Err(e);
            }
        };
        info!(run_id = %self.run_id, "Age distribution:\n{}", report);

        self.phase = IngestionPhase::Done;
        Ok(IngestionSummary {
            run_id: self.run_id.clone(),
            rows_processed: self.rows_processed,
            rows_skipped: self.rows_skipped,
            rows_rejected: self.rows_rejected,
            tuples_submitted: self.tuples_submitted,
            batches_submitted: self.batches_submitted,
            rows_inserted: outcome.rows_inserted,
            read_elapsed,
            report: Some(report),
        })
    }

    /// Blank lines are dropped before counting; the first other line is the header. Column
    /// mismatches are dropped after counting.
    fn accept_line(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        if self.header.is_none() {
            self.header = Some(parse_header(line));
            return;
        }

        self.rows_processed += 1;
        let decoded = self.header.as_deref().and_then(|header| decode(header, line));
        let Some(record) = decoded else {
            self.rows_skipped += 1;
            return;
        };

        match project(&record) {
            Ok(tuple) => {
                self.tuples_submitted += 1;
                if let Some(batch) = self.accumulator.offer(tuple) {
                    self.submit(batch);
                }
            }
            Err(e) => {
                self.rows_rejected += 1;
                warn!(run_id = %self.run_id, "Error projecting row {}: {}", self.rows_processed, e);
            }
        }
    }

    fn submit(&mut self, batch: Batch) {
        self.batches_submitted += 1;
        self.pending.push(self.loader.load(batch));
    }
}

/// Start ingesting `path` in the background and return at once; the outcome is only
/// observable through the handle and the logs.
pub fn spawn_file_ingestion(
    store: Arc<dyn UserStore>,
    batch_size: usize,
    path: PathBuf,
    signal: Option<ReadySignal>,
    poll_interval: Duration,
) -> JoinHandle<Result<IngestionSummary>> {
    tokio::spawn(async move {
        let mut coordinator = IngestionCoordinator::new(store, batch_size);
        coordinator.run_file(&path, signal, poll_interval).await
    })
}
