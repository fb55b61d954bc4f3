//! Progressive, cancellable box queries over multi-resolution datasets.
//!
//! Every view owns one [`QueryScheduler`]. The view pushes a
//! [`ProgressiveQueryJob`] whenever its visible box changes; the scheduler's
//! worker runs the job's refinement steps against the [`Dataset`] and drops
//! each partial answer into a single-slot mailbox that the view drains once
//! per display tick.
//!
//! # Architecture
//!
//! ```text
//! View tick                           Scheduler worker (tokio task)
//!    │                                        │
//!    ├─► token.set_true()  ───────────────►   │ checks token between steps
//!    ├─► wait_idle().await ◄───── phase ───── │
//!    ├─► push_job(job) ──────── slot ──────►  ├─► dataset.execute_box_query()
//!    │                                        │        │ step 1, 2, … N
//!    └─► pop_result(true) ◄──── mailbox ───── ┴────────┘ publish (overwrite)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use query_engine::{ProgressiveQueryJob, QueryBudget, QueryScheduler, CancellationToken};
//!
//! let scheduler = QueryScheduler::new("view-0", &EngineConfig::default());
//! scheduler.start();
//!
//! let job = ProgressiveQueryJob::new(dataset.clone(), access.clone(), logic_box)
//!     .with_field("data")
//!     .with_budget(QueryBudget::MaxPixels(1024 * 768))
//!     .with_refinements(3);
//! scheduler.push_job(job)?;
//!
//! if let Some(outcome) = scheduler.pop_result(true) {
//!     // paint it
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod dataset;
pub mod error;
pub mod job;
pub mod scheduler;
pub mod testdata;
pub mod types;

// Re-export commonly used types at crate root
pub use cancel::CancellationToken;
pub use config::EngineConfig;
pub use dataset::{
    AccessHandle, BoxQueryRequest, Dataset, DatasetAccess, DatasetMetadata, FieldInfo,
    QueryStream, SimpleAccess,
};
pub use error::{QueryError, Result};
pub use job::{plan_refinements, view_dependent_budget, ProgressiveQueryJob, QueryBudget};
pub use scheduler::{QueryScheduler, ResultMailbox, SchedulerPhase};
pub use testdata::SyntheticDataset;
pub use types::{PartialResult, QueryOutcome, QueryStep, SliceImage};
