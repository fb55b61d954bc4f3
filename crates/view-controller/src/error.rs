//! Error types for view control.

use query_engine::QueryError;
use slice_common::SliceError;
use thiserror::Error;

/// Errors raised by a view or a group of views.
#[derive(Error, Debug)]
pub enum ViewError {
    /// The operation needs a bound dataset.
    #[error("no dataset bound to view")]
    NoDataset,

    /// The dataset has no field with this name.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// The dataset has no axis with this name.
    #[error("unknown direction: {0}")]
    UnknownDirection(String),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Coordinate mapping failed (e.g. a zero-scale axis).
    #[error(transparent)]
    Geometry(#[from] SliceError),

    /// The scheduler rejected a job.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Failed to read a configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a configuration file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ViewError {
    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias using ViewError.
pub type Result<T> = std::result::Result<T, ViewError>;
