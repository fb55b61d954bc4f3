//! Coordinate mapping between a dataset's logical index space and the 2D
//! physical space shown on screen.
//!
//! A [`CoordinateMapper`] applies a per-axis affine transform and, for 3D
//! data, removes the slicing axis on the way out (projection) and rebuilds it
//! from the slice offset on the way back (unprojection).

pub mod linear;
pub mod mapper;

pub use linear::{linear_mapping, physic_box, transform_from_physic_box};
pub use mapper::CoordinateMapper;
