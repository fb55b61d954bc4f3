//! The dataset collaborator consumed by the scheduler.
//!
//! Storage format, resampling and transport all live behind [`Dataset`];
//! the engine only asks for logical sizes, metadata, and a lazy sequence of
//! refinement steps for a box.

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use slice_common::{Direction, LogicalBox};

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::job::QueryBudget;
use crate::types::QueryStep;

/// Lazy, finite, non-restartable sequence of refinement steps.
pub type QueryStream = BoxStream<'static, Result<QueryStep>>;

/// Per-reader access capability.
///
/// One handle is created per view and only used by that view's worker, so
/// implementations never need to be safe for concurrent queries.
pub trait DatasetAccess: Send + Sync + fmt::Debug {
    /// Identifier used in logs.
    fn id(&self) -> u64;
}

/// Shared handle to an access capability.
pub type AccessHandle = Arc<dyn DatasetAccess>;

/// Access handle that carries nothing but an identifier.
#[derive(Debug)]
pub struct SimpleAccess {
    id: u64,
}

impl SimpleAccess {
    /// Allocate a handle with a process-unique id.
    pub fn allocate() -> AccessHandle {
        static NEXT_ACCESS_ID: AtomicU64 = AtomicU64::new(1);
        Arc::new(Self {
            id: NEXT_ACCESS_ID.fetch_add(1, Ordering::Relaxed),
        })
    }
}

impl DatasetAccess for SimpleAccess {
    fn id(&self) -> u64 {
        self.id
    }
}

/// Parameters of one box query.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxQueryRequest {
    pub timestep: i64,
    pub field: String,
    pub logic_box: LogicalBox,
    /// Slicing axis of 3D boxes. The other two axes span the image.
    pub direction: Direction,
    pub budget: QueryBudget,
    /// Number of refinement steps to produce.
    pub num_refinements: usize,
}

/// A field of the dataset and the range of its value type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub dtype_range: (f64, f64),
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            dtype_range: (low, high),
        }
    }
}

/// Descriptive metadata of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub fields: Vec<FieldInfo>,
    pub timesteps: Vec<i64>,
    /// Physical extent `(A, B)` per logical axis.
    pub physic_box: Vec<(f64, f64)>,
    /// Axis names in logical order, e.g. `["X", "Y", "Z"]`.
    pub axis_names: Vec<String>,
}

impl DatasetMetadata {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The field shown when a view does not ask for one.
    pub fn default_field(&self) -> Option<&FieldInfo> {
        self.fields.first()
    }

    /// Map of axis name to logical axis index.
    pub fn directions(&self) -> Vec<(String, usize)> {
        if self.axis_names.is_empty() {
            return ["X", "Y", "Z"]
                .iter()
                .take(self.physic_box.len().max(2))
                .enumerate()
                .map(|(i, name)| (name.to_string(), i))
                .collect();
        }
        self.axis_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect()
    }
}

/// A multi-resolution spatial dataset.
pub trait Dataset: Send + Sync {
    /// Number of samples per logical axis at full resolution.
    fn logic_size(&self) -> Vec<u64>;

    /// Finest resolution level.
    fn max_resolution(&self) -> u32;

    /// Number of logical dimensions (2 or 3).
    fn point_dim(&self) -> usize {
        self.logic_size().len()
    }

    /// Create a fresh access capability for one reader.
    fn create_access(&self) -> AccessHandle;

    /// Start a progressive box query.
    ///
    /// The returned stream must stop producing as soon as it observes
    /// `token` set.
    fn execute_box_query(
        &self,
        access: AccessHandle,
        request: BoxQueryRequest,
        token: CancellationToken,
    ) -> QueryStream;

    /// Descriptive metadata.
    fn metadata(&self) -> &DatasetMetadata;
}
