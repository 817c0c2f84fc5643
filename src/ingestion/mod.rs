//! Ingestion Module - streaming CSV transform-and-load
//!
//! Lines flow through:
//! - `decoder`: header paths + raw line -> nested record
//! - `projector`: nested record -> fixed four-field tuple
//! - `batch`: fixed-size batching of tuples
//! - `loader`: fire-and-forget multi-row inserts
//! - `coordinator`: drives the stream and joins every pending insert before reporting

pub mod batch;
pub mod coordinator;
pub mod decoder;
pub mod loader;
pub mod path;
pub mod projector;
pub mod source;

pub use batch::{Batch, BatchAccumulator};
pub use coordinator::{spawn_file_ingestion, IngestionCoordinator, IngestionPhase};
pub use decoder::{decode, parse_header};
pub use loader::{join_all, BatchLoader, JoinOutcome, PendingLoad};
pub use path::{assign, HeaderPath};
pub use projector::{project, Age, ProjectedTuple, ProjectionError};
pub use source::{await_source, open_lines, ready_signal, ReadySignal, ReadyTrigger, SourceLines};

use crate::report::AgeReport;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ordered mapping used for every nested level of a decoded record.
pub type FieldMap = IndexMap<String, FieldValue>;

/// Tagged value tree built from dotted header paths.
///
/// Serializes to plain JSON: scalars as strings, mappings as objects in insertion order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(String),
    Mapping(FieldMap),
}

impl FieldValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            FieldValue::Scalar(s) => Some(s),
            FieldValue::Mapping(_) => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&FieldMap> {
        match self {
            FieldValue::Mapping(m) => Some(m),
            FieldValue::Scalar(_) => None,
        }
    }
}

/// One decoded row: the root mapping.
pub type DecodedRecord = FieldMap;

/// Totals for one ingestion run.
#[derive(Clone, Debug, Serialize)]
pub struct IngestionSummary {
    pub run_id: String,

    /// Data lines attempted (blank lines and the header excluded).
    pub rows_processed: u64,

    /// Lines dropped because their column count did not match the header.
    pub rows_skipped: u64,

    /// Lines that failed projection.
    pub rows_rejected: u64,

    pub tuples_submitted: u64,
    pub batches_submitted: usize,

    /// Rows the store acknowledged across all batches.
    pub rows_inserted: u64,

    /// Time spent reading and dispatching the stream.
    pub read_elapsed: Duration,

    pub report: Option<AgeReport>,
}
