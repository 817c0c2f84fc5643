use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raised once at the join barrier; individual failing batches are not distinguished.
    #[error("{failed} of {total} insert batches failed (first failure: {first})")]
    BatchJoin {
        failed: usize,
        total: usize,
        first: String,
    },

    #[error("Upload error: {0}")]
    Upload(String),
}

impl From<sqlx::Error> for LoaderError {
    fn from(err: sqlx::Error) -> Self {
        LoaderError::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LoaderError>;
