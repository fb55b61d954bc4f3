//! In-memory dataset that synthesizes samples on demand.
//!
//! Used by the demo service and by tests that need a real multi-resolution
//! backend without any storage. Values follow `(x + y + z + t) % 256` at
//! full-resolution index coordinates.

use futures::stream;
use std::time::Duration;
use tracing::debug;

use slice_common::{Direction, LogicalBox};

use crate::cancel::CancellationToken;
use crate::dataset::{
    AccessHandle, BoxQueryRequest, Dataset, DatasetMetadata, FieldInfo, QueryStream,
    SimpleAccess,
};
use crate::error::QueryError;
use crate::job::plan_refinements;
use crate::types::{QueryStep, SliceImage};

const AXIS_NAMES: [&str; 3] = ["X", "Y", "Z"];

/// A procedurally generated dataset of arbitrary logical size.
#[derive(Debug, Clone)]
pub struct SyntheticDataset {
    dims: Vec<u64>,
    max_level: u32,
    step_delay: Option<Duration>,
    metadata: DatasetMetadata,
}

/// `ceil(log2(d))`, with 0 for sizes of 0 or 1.
fn level_bits(d: u64) -> u32 {
    64 - d.saturating_sub(1).leading_zeros()
}

impl SyntheticDataset {
    /// Create a dataset with one field `data` and a single timestep.
    pub fn new(dims: Vec<u64>) -> Self {
        let max_level = dims.iter().map(|&d| level_bits(d)).sum();
        let metadata = DatasetMetadata {
            fields: vec![FieldInfo::new("data", 0.0, 255.0)],
            timesteps: vec![0],
            physic_box: dims.iter().map(|&d| (0.0, d as f64)).collect(),
            axis_names: AXIS_NAMES
                .iter()
                .take(dims.len())
                .map(|s| s.to_string())
                .collect(),
        };
        Self {
            dims,
            max_level,
            step_delay: None,
            metadata,
        }
    }

    /// Sleep before producing each refinement step.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = Some(delay);
        self
    }

    /// Expose timesteps `0..count`.
    pub fn with_timesteps(mut self, count: i64) -> Self {
        self.metadata.timesteps = (0..count.max(1)).collect();
        self
    }

    /// Replace the physical extent reported in the metadata.
    pub fn with_physic_box(mut self, physic_box: Vec<(f64, f64)>) -> Self {
        self.metadata.physic_box = physic_box;
        self
    }

    /// Add another field with the given value range.
    pub fn with_field(mut self, name: &str, low: f64, high: f64) -> Self {
        self.metadata.fields.push(FieldInfo::new(name, low, high));
        self
    }

    /// Clip `logic_box` to the dataset bounds, snapping to whole samples.
    pub fn clip(&self, logic_box: &LogicalBox) -> LogicalBox {
        let mut p1 = Vec::with_capacity(self.dims.len());
        let mut p2 = Vec::with_capacity(self.dims.len());
        for (axis, &d) in self.dims.iter().enumerate() {
            let d = d as f64;
            let lo = logic_box.p1.get(axis).copied().unwrap_or(0.0);
            let hi = logic_box.p2.get(axis).copied().unwrap_or(d);
            let lo = lo.floor().clamp(0.0, d);
            let hi = hi.ceil().clamp(lo, d);
            p1.push(lo);
            p2.push(hi);
        }
        LogicalBox { p1, p2 }
    }
}

/// Sample `clipped` at `level`, decimating the two image axes.
fn sample(
    clipped: &LogicalBox,
    direction: Direction,
    level: u32,
    max_level: u32,
    timestep: i64,
) -> SliceImage {
    let extent = clipped.extent();
    if extent.iter().any(|&e| e <= 0.0) {
        return SliceImage::empty();
    }

    let (a0, a1) = if extent.len() == 3 {
        direction.plane_axes()
    } else {
        (0, 1)
    };

    let shift = max_level.saturating_sub(level).min(62);
    let stride0 = 1u64 << ((shift + 1) / 2);
    let stride1 = 1u64 << (shift / 2);

    let origin: Vec<u64> = clipped.p1.iter().map(|&v| v as u64).collect();
    let len0 = extent[a0] as u64;
    let len1 = extent[a1] as u64;
    let width = len0.div_ceil(stride0).max(1) as usize;
    let height = len1.div_ceil(stride1).max(1) as usize;

    let base: u64 = origin.iter().sum::<u64>() + timestep.max(0) as u64;
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height as u64 {
        for col in 0..width as u64 {
            let v = base + col * stride0 + row * stride1;
            data.push((v % 256) as f32);
        }
    }
    SliceImage::new(data, width, height)
}

impl Dataset for SyntheticDataset {
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
        access: AccessHandle,
        request: BoxQueryRequest,
        token: CancellationToken,
    ) -> QueryStream {
        if !request.field.is_empty() && self.metadata.field(&request.field).is_none() {
            let err = QueryError::UnknownField(request.field);
            return Box::pin(stream::once(async move { Err::<QueryStep, _>(err) }));
        }

        let clipped = self.clip(&request.logic_box);
        let plan = plan_refinements(
            &clipped,
            request.budget,
            self.max_level,
            request.num_refinements,
            self.dims.len(),
        );
        debug!(
            access = access.id(),
            logic_box = %clipped,
            levels = ?plan,
            "Planned synthetic query"
        );

        let max_level = self.max_level;
        let delay = self.step_delay;
        let timestep = request.timestep;
        let direction = request.direction;

        Box::pin(stream::unfold(0usize, move |index| {
            let plan = plan.clone();
            let clipped = clipped.clone();
            let token = token.clone();
            async move {
                if index >= plan.len() || token.is_true() {
                    return None;
                }
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                    if token.is_true() {
                        return None;
                    }
                }

                let level = plan[index];
                let running = index + 1 < plan.len();
                let logic_box = clipped.clone();
                let step = tokio::task::spawn_blocking(move || {
                    let image = sample(&clipped, direction, level, max_level, timestep);
                    QueryStep {
                        image,
                        logic_box,
                        level,
                        running,
                    }
                })
                .await
                .map_err(|e| QueryError::failure(format!("sampling task failed: {e}")));

                Some((step, index + 1))
            }
        }))
    }

    fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::QueryBudget;
    use futures::StreamExt;

    fn request(logic_box: LogicalBox, budget: QueryBudget, steps: usize) -> BoxQueryRequest {
        BoxQueryRequest {
            timestep: 0,
            field: "data".to_string(),
            logic_box,
            direction: Direction::Z,
            budget,
            num_refinements: steps,
        }
    }

    #[test]
    fn test_max_level() {
        assert_eq!(SyntheticDataset::new(vec![64, 64]).max_resolution(), 12);
        assert_eq!(SyntheticDataset::new(vec![1024, 1024]).max_resolution(), 20);
        assert_eq!(SyntheticDataset::new(vec![100, 1, 3]).max_resolution(), 9);
    }

    #[test]
    fn test_clip() {
        let ds = SyntheticDataset::new(vec![10, 10]);
        let b = LogicalBox {
            p1: vec![-5.0, 2.5],
            p2: vec![4.2, 30.0],
        };
        let clipped = ds.clip(&b);
        assert_eq!(clipped.p1, vec![0.0, 2.0]);
        assert_eq!(clipped.p2, vec![5.0, 10.0]);
    }

    #[tokio::test]
    async fn test_full_resolution_values() {
        let ds = SyntheticDataset::new(vec![8, 4]);
        let req = request(LogicalBox::full(&[8, 4]), QueryBudget::Resolution(5), 1);
        let steps: Vec<_> = ds
            .execute_box_query(ds.create_access(), req, CancellationToken::new())
            .collect()
            .await;

        assert_eq!(steps.len(), 1);
        let step = steps[0].as_ref().unwrap();
        assert_eq!((step.image.width, step.image.height), (8, 4));
        assert_eq!(step.image.get(3, 2), Some(5.0));
        assert!(!step.running);
    }

    #[tokio::test]
    async fn test_slice_of_volume() {
        let ds = SyntheticDataset::new(vec![16, 8, 4]);
        let b = LogicalBox {
            p1: vec![0.0, 0.0, 2.0],
            p2: vec![16.0, 8.0, 3.0],
        };
        let req = request(b, QueryBudget::Resolution(ds.max_resolution()), 1);
        let steps: Vec<_> = ds
            .execute_box_query(ds.create_access(), req, CancellationToken::new())
            .collect()
            .await;

        let step = steps[0].as_ref().unwrap();
        assert_eq!((step.image.width, step.image.height), (16, 8));
        assert_eq!(step.image.get(0, 0), Some(2.0));
    }

    #[tokio::test]
    async fn test_image_axes_follow_direction() {
        // one sample thick along X and Z: only the direction tells them apart
        let ds = SyntheticDataset::new(vec![16, 8, 4]);
        let b = LogicalBox {
            p1: vec![5.0, 2.0, 1.0],
            p2: vec![6.0, 6.0, 2.0],
        };
        let req = BoxQueryRequest {
            direction: Direction::X,
            ..request(b, QueryBudget::Resolution(ds.max_resolution()), 1)
        };
        let steps: Vec<_> = ds
            .execute_box_query(ds.create_access(), req, CancellationToken::new())
            .collect()
            .await;

        let step = steps[0].as_ref().unwrap();
        assert_eq!((step.image.width, step.image.height), (4, 1));
    }

    #[tokio::test]
    async fn test_refinements_increase_detail() {
        let ds = SyntheticDataset::new(vec![256, 256]);
        let req = request(LogicalBox::full(&[256, 256]), QueryBudget::Resolution(16), 3);
        let steps: Vec<_> = ds
            .execute_box_query(ds.create_access(), req, CancellationToken::new())
            .collect()
            .await;

        let levels: Vec<u32> = steps.iter().map(|s| s.as_ref().unwrap().level).collect();
        assert_eq!(levels, vec![12, 14, 16]);
        let sizes: Vec<usize> = steps.iter().map(|s| s.as_ref().unwrap().image.len()).collect();
        assert!(sizes.windows(2).all(|w| w[0] < w[1]));
        assert!(steps[1].as_ref().unwrap().running);
    }

    #[tokio::test]
    async fn test_unknown_field() {
        let ds = SyntheticDataset::new(vec![8, 8]);
        let mut req = request(LogicalBox::full(&[8, 8]), QueryBudget::Resolution(6), 2);
        req.field = "pressure".to_string();
        let steps: Vec<_> = ds
            .execute_box_query(ds.create_access(), req, CancellationToken::new())
            .collect()
            .await;

        assert_eq!(steps.len(), 1);
        assert!(matches!(steps[0], Err(QueryError::UnknownField(_))));
    }

    #[tokio::test]
    async fn test_aborted_token_yields_nothing() {
        let ds = SyntheticDataset::new(vec![8, 8]);
        let token = CancellationToken::new();
        token.set_true();
        let req = request(LogicalBox::full(&[8, 8]), QueryBudget::Resolution(6), 3);
        let steps: Vec<_> = ds.execute_box_query(ds.create_access(), req, token).collect().await;
        assert!(steps.is_empty());
    }
}
