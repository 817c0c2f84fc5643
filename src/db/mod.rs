//! Database module for the `users` relation
//!
//! `UserStore` is the seam between the ingestion pipeline and storage; `PgUserStore` backs it
//! with PostgreSQL and `MemoryUserStore` keeps rows in-process.

pub mod connection;
pub mod memory;
pub mod users_repo;

pub use connection::{init_pool, DbPool};
pub use memory::MemoryUserStore;
pub use users_repo::PgUserStore;

use crate::error::Result;
use crate::ingestion::ProjectedTuple;
use crate::report::AgeReport;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert one batch as a single multi-row statement; returns rows written.
    async fn insert_batch(&self, rows: &[ProjectedTuple]) -> Result<u64>;

    /// Percentage of stored rows per age group.
    async fn age_distribution(&self) -> Result<AgeReport>;

    /// Delete every stored row; returns rows deleted.
    async fn clear(&self) -> Result<u64>;

    /// Liveness check returning the store's clock.
    async fn now(&self) -> Result<DateTime<Utc>>;

    /// Create the relation if it does not exist yet.
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }
}
