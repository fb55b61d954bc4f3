//! Common types shared across the slice viewer crates.

pub mod bbox;
pub mod error;
pub mod transform;

pub use bbox::{LogicalBox, PhysicalBox};
pub use error::{SliceError, SliceResult};
pub use transform::{AffineAxis, Direction, OffsetRange};
