//! Loader configuration, read from the process environment (and `.env` when present).

use crate::error::{LoaderError, Result};
use crate::ingestion::projector::parse_leading_int;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// PostgreSQL caps a statement at 65535 bind parameters; each row binds four.
pub const MAX_BATCH_SIZE: usize = 65535 / 4;

#[derive(Clone, Debug)]
pub struct LoaderConfig {
    pub database_url: Option<String>,
    pub batch_size: usize,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub upload_dir: PathBuf,
    pub poll_interval: Duration,
    pub port: u16,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            batch_size: DEFAULT_BATCH_SIZE,
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
            upload_dir: PathBuf::from("public"),
            poll_interval: Duration::from_millis(200),
            port: 3000,
        }
    }
}

impl LoaderConfig {
    /// Build the configuration from environment variables. Call `dotenv::dotenv()` first
    /// if a `.env` file should be honoured.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`LoaderConfig::from_env`] but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL")
            .or_else(|| lookup("POSTGRES_CONNECTION_STRING"))
            .filter(|url| !url.trim().is_empty());

        let batch_size = batch_size_from(lookup("BATCH_SIZE").as_deref());

        let max_connections = lookup("DB_MAX_CONNECTIONS")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_connections);

        let acquire_timeout = lookup("DB_ACQUIRE_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.acquire_timeout);

        let upload_dir = lookup("UPLOAD_DIR")
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.upload_dir);

        let poll_interval = lookup("UPLOAD_POLL_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);

        let port = lookup("PORT")
            .and_then(|v| v.trim().parse::<u16>().ok())
            .unwrap_or(defaults.port);

        Self {
            database_url,
            batch_size,
            max_connections,
            acquire_timeout,
            upload_dir,
            poll_interval,
            port,
        }
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            LoaderError::Config(
                "DATABASE_URL (or POSTGRES_CONNECTION_STRING) is not set".to_string(),
            )
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = clamp_batch_size(batch_size);
        self
    }
}

/// `BATCH_SIZE` follows leading-integer parsing; absent, non-numeric and non-positive
/// values fall back to the default.
pub fn batch_size_from(raw: Option<&str>) -> usize {
    match raw.and_then(parse_leading_int) {
        Some(n) if n > 0 => clamp_batch_size(usize::try_from(n).unwrap_or(MAX_BATCH_SIZE)),
        _ => DEFAULT_BATCH_SIZE,
    }
}

fn clamp_batch_size(batch_size: usize) -> usize {
    if batch_size == 0 {
        return DEFAULT_BATCH_SIZE;
    }
    if batch_size > MAX_BATCH_SIZE {
        warn!(
            "BATCH_SIZE {} exceeds the statement parameter limit, using {}",
            batch_size, MAX_BATCH_SIZE
        );
        return MAX_BATCH_SIZE;
    }
    batch_size
}
