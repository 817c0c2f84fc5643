//! In-process store, used for dry runs and tests.

use super::UserStore;
use crate::error::Result;
use crate::ingestion::ProjectedTuple;
use crate::report::AgeReport;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

#[derive(Default)]
pub struct MemoryUserStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    rows: Vec<ProjectedTuple>,
    /// Size of every insert statement, in completion order.
    batch_sizes: Vec<usize>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn rows(&self) -> Vec<ProjectedTuple> {
        self.state.lock().await.rows.clone()
    }

    pub async fn batch_sizes(&self) -> Vec<usize> {
        self.state.lock().await.batch_sizes.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert_batch(&self, rows: &[ProjectedTuple]) -> Result<u64> {
        let mut state = self.state.lock().await;
        state.rows.extend_from_slice(rows);
        state.batch_sizes.push(rows.len());
        Ok(rows.len() as u64)
    }

    async fn age_distribution(&self) -> Result<AgeReport> {
        let state = self.state.lock().await;
        Ok(AgeReport::from_ages(state.rows.iter().map(|r| r.age.as_option())))
    }

    async fn clear(&self) -> Result<u64> {
        let mut state = self.state.lock().await;
        let deleted = state.rows.len() as u64;
        state.rows.clear();
        state.batch_sizes.clear();
        Ok(deleted)
    }

    async fn now(&self) -> Result<DateTime<Utc>> {
        Ok(Utc::now())
    }
}
