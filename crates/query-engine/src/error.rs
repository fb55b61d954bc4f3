//! Error types for query scheduling.

use slice_common::SliceError;
use thiserror::Error;

/// Errors that can occur while scheduling or executing box queries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// A refinement step failed in the dataset backend.
    #[error("query failed: {0}")]
    QueryFailure(String),

    /// A job was pushed to a scheduler that is not running.
    #[error("scheduler {0} is stopped")]
    SchedulerStopped(String),

    /// The requested field does not exist in the dataset.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// Coordinate handling failed.
    #[error(transparent)]
    Geometry(#[from] SliceError),
}

impl QueryError {
    /// Create a QueryFailure error.
    pub fn failure(msg: impl Into<String>) -> Self {
        Self::QueryFailure(msg.into())
    }
}

impl From<std::io::Error> for QueryError {
    fn from(err: std::io::Error) -> Self {
        Self::QueryFailure(err.to_string())
    }
}

/// Result type for query engine operations.
pub type Result<T> = std::result::Result<T, QueryError>;
