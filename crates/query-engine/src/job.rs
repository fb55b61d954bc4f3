//! Progressive query jobs and resolution selection.
//!
//! A job is built with a fluent API and is immutable once pushed:
//!
//! ```ignore
//! let job = ProgressiveQueryJob::new(dataset, access, logic_box)
//!     .at_timestep(3)
//!     .with_field("temperature")
//!     .with_budget(QueryBudget::Resolution(18))
//!     .with_refinements(3);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use slice_common::{Direction, LogicalBox};

use crate::cancel::CancellationToken;
use crate::dataset::{AccessHandle, BoxQueryRequest, Dataset};

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// How detailed the final refinement step should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryBudget {
    /// View-dependent: finest level whose sample count fits the budget.
    MaxPixels(u64),
    /// Fixed resolution level.
    Resolution(u32),
}

impl QueryBudget {
    /// Pixel budget, if view-dependent.
    pub fn max_pixels(&self) -> Option<u64> {
        match self {
            QueryBudget::MaxPixels(n) => Some(*n),
            QueryBudget::Resolution(_) => None,
        }
    }

    /// Target level, if fixed.
    pub fn end_resolution(&self) -> Option<u32> {
        match self {
            QueryBudget::MaxPixels(_) => None,
            QueryBudget::Resolution(h) => Some(*h),
        }
    }
}

/// Pixel budget for view-dependent queries.
///
/// Starts from the canvas pixel count and multiplies (or divides) it by
/// `quality_base ^ |requested_level - max_level|` when the requested level is
/// finer (or coarser) than the dataset's native level.
pub fn view_dependent_budget(
    canvas_width: u32,
    canvas_height: u32,
    requested_level: u32,
    max_level: u32,
    quality_base: f64,
) -> u64 {
    let pixels = canvas_width as f64 * canvas_height as f64;
    let delta = requested_level.abs_diff(max_level) as i32;
    let factor = quality_base.powi(delta);
    let budget = if requested_level < max_level {
        pixels / factor
    } else if requested_level > max_level {
        pixels * factor
    } else {
        pixels
    };
    budget as u64
}

/// Resolution levels a dataset should produce, coarsest first.
///
/// The end level comes from the budget. Steps are spaced by `pdim` levels
/// (one halving per axis) and squeezed tighter when the end level is too
/// low to fit them. The result is strictly increasing and never empty.
pub fn plan_refinements(
    logic_box: &LogicalBox,
    budget: QueryBudget,
    max_level: u32,
    num_refinements: usize,
    pdim: usize,
) -> Vec<u32> {
    let end = match budget {
        QueryBudget::Resolution(h) => h.min(max_level),
        QueryBudget::MaxPixels(max_pixels) => {
            let samples = logic_box.num_samples();
            (0..=max_level)
                .rev()
                .find(|&h| samples / 2f64.powi((max_level - h) as i32) <= max_pixels as f64)
                .unwrap_or(0)
        }
    };

    let steps = num_refinements.max(1) as u32;
    let mut stride = pdim.max(1) as u32;
    while stride > 1 && end < stride * (steps - 1) {
        stride -= 1;
    }

    let mut levels: Vec<u32> = (0..steps)
        .map(|i| end.saturating_sub(stride * (steps - 1 - i)))
        .collect();
    levels.dedup();
    levels
}

/// One query for one view.
#[derive(Clone)]
pub struct ProgressiveQueryJob {
    pub id: u64,
    pub dataset: Arc<dyn Dataset>,
    pub access: AccessHandle,
    pub request: BoxQueryRequest,
    pub token: CancellationToken,
}

impl ProgressiveQueryJob {
    /// Create a job over `logic_box` with defaults: timestep 0, empty field
    /// (dataset default), Z slicing, the dataset's max resolution, one step,
    /// fresh token.
    pub fn new(dataset: Arc<dyn Dataset>, access: AccessHandle, logic_box: LogicalBox) -> Self {
        let max_level = dataset.max_resolution();
        Self {
            id: NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed),
            dataset,
            access,
            request: BoxQueryRequest {
                timestep: 0,
                field: String::new(),
                logic_box,
                direction: Direction::Z,
                budget: QueryBudget::Resolution(max_level),
                num_refinements: 1,
            },
            token: CancellationToken::new(),
        }
    }

    pub fn at_timestep(mut self, timestep: i64) -> Self {
        self.request.timestep = timestep;
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.request.field = field.into();
        self
    }

    /// Slice 3D data along `direction`.
    pub fn along(mut self, direction: Direction) -> Self {
        self.request.direction = direction;
        self
    }

    pub fn with_budget(mut self, budget: QueryBudget) -> Self {
        self.request.budget = budget;
        self
    }

    pub fn with_refinements(mut self, num_refinements: usize) -> Self {
        self.request.num_refinements = num_refinements;
        self
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn logic_box(&self) -> &LogicalBox {
        &self.request.logic_box
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_true()
    }
}

impl fmt::Debug for ProgressiveQueryJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressiveQueryJob")
            .field("id", &self.id)
            .field("access", &self.access.id())
            .field("request", &self.request)
            .field("aborted", &self.token.is_true())
            .finish()
    }
}
