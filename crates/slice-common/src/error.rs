//! Error types for coordinate handling.

use thiserror::Error;

/// Result type alias using SliceError.
pub type SliceResult<T> = Result<T, SliceError>;

/// Errors raised while mapping between logical and physical space.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SliceError {
    /// An axis used for division has a zero scale.
    #[error("degenerate transform: axis {axis} has zero scale")]
    DegenerateTransform { axis: usize },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid slicing direction {0}")]
    InvalidDirection(usize),

    #[error("invalid box: {0}")]
    InvalidBox(String),
}

impl SliceError {
    /// Create a DegenerateTransform error for the given axis.
    pub fn degenerate(axis: usize) -> Self {
        Self::DegenerateTransform { axis }
    }

    /// Create a DimensionMismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }
}
