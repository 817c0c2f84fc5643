pub mod config;
pub mod db;
pub mod error;
pub mod ingestion;
pub mod logging;
pub mod report;
pub mod server;

pub use config::LoaderConfig;
pub use db::{MemoryUserStore, PgUserStore, UserStore};
pub use error::{LoaderError, Result};
pub use ingestion::{IngestionCoordinator, IngestionSummary};
pub use report::AgeReport;
