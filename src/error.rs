//! Error types for the funnel engine.
//!
//! Every variant is a local, recoverable condition. Callers receive the
//! structured error and decide whether to re-prompt or report it.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors returned by store, aggregation, editing and CSV exchange operations.
#[derive(Debug, Error)]
pub enum FunnelError {
    /// Out-of-range or malformed input value.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Day index outside the tracked window (1-based).
    #[error("day {day} is outside the tracked window (1..={window_days})")]
    IndexOutOfRange { day: usize, window_days: usize },

    /// Inverted date range, or a range with no day inside the window.
    #[error("date range {start}..={end} selects no tracked days")]
    EmptyRange { start: NaiveDate, end: NaiveDate },

    /// CSV header or row shape does not match the export format.
    #[error("schema mismatch: {0}")]
    Schema(String),

    /// Imported data collides with existing cells under a rejecting policy.
    #[error("{count} conflicting cell(s), first at {first}")]
    Conflict { count: usize, first: String },

    /// Referenced platform is not on the roster or has no data.
    #[error("platform not found: {0}")]
    MissingPlatform(String),

    /// Malformed CSV syntax.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FunnelError {
    /// Convenience constructor for validation failures.
    pub fn validation(msg: impl Into<String>) -> Self {
        FunnelError::Validation(msg.into())
    }

    /// Convenience constructor for schema failures.
    pub fn schema(msg: impl Into<String>) -> Self {
        FunnelError::Schema(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, FunnelError>;
