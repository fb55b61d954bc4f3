//! Core result types for box queries.

use slice_common::LogicalBox;
use std::time::Duration;

/// A 2D array of samples produced by one refinement step.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceImage {
    /// Sample values (row-major order).
    pub data: Vec<f32>,
    /// Number of columns.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
}

impl SliceImage {
    /// Create a new image. `data.len()` must equal `width * height`.
    pub fn new(data: Vec<f32>, width: usize, height: usize) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            data,
            width,
            height,
        }
    }

    /// An image with no samples.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0, 0)
    }

    /// Get the value at a specific cell.
    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.data.get(row * self.width + col).copied()
    }

    /// Minimum and maximum of the finite samples, or `None` if there are none.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.data
            .iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc, &v| {
                let v = v as f64;
                match acc {
                    None => Some((v, v)),
                    Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
                }
            })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// One refinement step as produced by a dataset.
#[derive(Debug, Clone)]
pub struct QueryStep {
    pub image: SliceImage,
    /// Logical box the samples actually cover.
    pub logic_box: LogicalBox,
    /// Resolution level reached by this step.
    pub level: u32,
    /// More steps follow this one.
    pub running: bool,
}

/// A refinement step as delivered to a view.
#[derive(Debug, Clone)]
pub struct PartialResult {
    /// Id of the job that produced this result.
    pub job_id: u64,
    pub image: SliceImage,
    pub logic_box: LogicalBox,
    /// Achieved resolution level (`H`).
    pub level: u32,
    pub running: bool,
    /// Zero-based index of the step within its job.
    pub sequence: usize,
    /// Time since the job started executing.
    pub elapsed: Duration,
}

/// What the worker leaves in the mailbox.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    Partial(PartialResult),
    /// The job halted on a backend error. Sent at most once per job.
    Failed { job_id: u64, message: String },
}

impl QueryOutcome {
    pub fn job_id(&self) -> u64 {
        match self {
            QueryOutcome::Partial(result) => result.job_id,
            QueryOutcome::Failed { job_id, .. } => *job_id,
        }
    }

    /// Whether no further outcome will follow for this job.
    pub fn is_terminal(&self) -> bool {
        match self {
            QueryOutcome::Partial(result) => !result.running,
            QueryOutcome::Failed { .. } => true,
        }
    }
}
