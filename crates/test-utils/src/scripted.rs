//! A dataset whose refinement steps are fully controlled by the test.
//!
//! Each step returns a 2x1 image holding the configured `(min, max)` pair for
//! that step, so palette logic can be checked against known ranges. The
//! dataset also records every request it receives and how many queries were
//! executing at the same time.

use futures::stream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use query_engine::{
    plan_refinements, AccessHandle, BoxQueryRequest, CancellationToken, Dataset, DatasetMetadata,
    FieldInfo, QueryError, QueryStep, QueryStream, SimpleAccess, SliceImage,
};

#[derive(Debug, Default)]
struct Activity {
    active: AtomicUsize,
    max_active: AtomicUsize,
    started: AtomicUsize,
}

/// Decrements the active count when a query stream is dropped.
struct ActiveGuard(Arc<Activity>);

impl ActiveGuard {
    fn enter(activity: Arc<Activity>) -> Self {
        let now = activity.active.fetch_add(1, Ordering::SeqCst) + 1;
        activity.max_active.fetch_max(now, Ordering::SeqCst);
        activity.started.fetch_add(1, Ordering::SeqCst);
        Self(activity)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scripted multi-resolution dataset.
#[derive(Debug, Clone)]
pub struct ScriptedDataset {
    dims: Vec<u64>,
    max_level: u32,
    step_ranges: Vec<(f32, f32)>,
    step_delay: Option<Duration>,
    fail_next: Arc<Mutex<Option<usize>>>,
    requests: Arc<Mutex<Vec<BoxQueryRequest>>>,
    activity: Arc<Activity>,
    metadata: DatasetMetadata,
}

impl ScriptedDataset {
    /// Create a dataset of the given logical size and finest level.
    pub fn new(dims: &[u64], max_level: u32) -> Self {
        Self {
            dims: dims.to_vec(),
            max_level,
            step_ranges: Vec::new(),
            step_delay: None,
            fail_next: Arc::new(Mutex::new(None)),
            requests: Arc::new(Mutex::new(Vec::new())),
            activity: Arc::new(Activity::default()),
            metadata: DatasetMetadata {
                fields: vec![FieldInfo::new("data", 0.0, 1.0)],
                timesteps: vec![0, 1, 2],
                physic_box: dims.iter().map(|&d| (0.0, d as f64)).collect(),
                axis_names: Vec::new(),
            },
        }
    }

    /// Value range of the image returned by step `i`. Steps beyond the list
    /// reuse the last entry; with no entries each step yields `(level, level)`.
    pub fn with_step_ranges(mut self, ranges: Vec<(f32, f32)>) -> Self {
        self.step_ranges = ranges;
        self
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = Some(delay);
        self
    }

    pub fn with_metadata(mut self, metadata: DatasetMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Make the next query fail at step `index` (zero-based).
    pub fn fail_next_at(&self, index: usize) {
        *self.fail_next.lock().unwrap() = Some(index);
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<BoxQueryRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of queries started.
    pub fn query_count(&self) -> usize {
        self.activity.started.load(Ordering::SeqCst)
    }

    /// Highest number of queries observed executing at once.
    pub fn max_concurrent(&self) -> usize {
        self.activity.max_active.load(Ordering::SeqCst)
    }

    fn step_range(&self, index: usize, level: u32) -> (f32, f32) {
        self.step_ranges
            .get(index)
            .or(self.step_ranges.last())
            .copied()
            .unwrap_or((level as f32, level as f32))
    }
}

impl Dataset for ScriptedDataset {
    fn logic_size(&self) -> Vec<u64> {
        self.dims.clone()
    }

    fn max_resolution(&self) -> u32 {
        self.max_level
    }

    fn create_access(&self) -> AccessHandle {
        SimpleAccess::allocate()
    }

    fn execute_box_query(
        &self,
        _access: AccessHandle,
        request: BoxQueryRequest,
        token: CancellationToken,
    ) -> QueryStream {
        let guard = ActiveGuard::enter(self.activity.clone());
        self.requests.lock().unwrap().push(request.clone());
        let fail_at = self.fail_next.lock().unwrap().take();

        let plan = plan_refinements(
            &request.logic_box,
            request.budget,
            self.max_level,
            request.num_refinements,
            self.dims.len(),
        );
        let steps: Vec<(u32, (f32, f32))> = plan
            .iter()
            .enumerate()
            .map(|(i, &level)| (level, self.step_range(i, level)))
            .collect();
        let delay = self.step_delay;
        let logic_box = request.logic_box;

        Box::pin(stream::unfold((0usize, guard), move |(index, guard)| {
            let steps = steps.clone();
            let logic_box = logic_box.clone();
            let token = token.clone();
            async move {
                if index >= steps.len() || token.is_true() {
                    return None;
                }
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                if fail_at == Some(index) {
                    let err = QueryError::failure(format!("scripted failure at step {index}"));
                    // End the stream after the error.
                    return Some((Err(err), (steps.len(), guard)));
                }

                let (level, (lo, hi)) = steps[index];
                let step = QueryStep {
                    image: SliceImage::new(vec![lo, hi], 2, 1),
                    logic_box,
                    level,
                    running: index + 1 < steps.len(),
                };
                Some((Ok(step), (index + 1, guard)))
            }
        }))
    }

    fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }
}
