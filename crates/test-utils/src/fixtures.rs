//! Common test fixtures for slice viewer tests.
//!
//! Pre-defined dataset shapes and canvas sizes representing typical
//! scenarios: a large 2D image, a cubic volume, and a thin stack.

use std::sync::Arc;

use query_engine::{Dataset, SyntheticDataset};

/// Common logical sizes.
pub mod dims {
    /// 1024x1024 image (max level 20)
    pub const IMAGE_1K: [u64; 2] = [1024, 1024];

    /// Small 64x64 image (max level 12)
    pub const IMAGE_SMALL: [u64; 2] = [64, 64];

    /// Cubic 512^3 volume (max level 27)
    pub const VOLUME_512: [u64; 3] = [512, 512, 512];

    /// Small anisotropic volume, handy for direction tests
    pub const VOLUME_SMALL: [u64; 3] = [64, 32, 16];

    /// Thin stack of 10 images of 256x128
    pub const STACK: [u64; 3] = [256, 128, 10];
}

/// Common canvas sizes, `(width, height)` in pixels.
pub mod canvas {
    /// XGA canvas
    pub const XGA: (u32, u32) = (1024, 768);

    /// Square canvas
    pub const SQUARE: (u32, u32) = (512, 512);

    /// Small canvas to keep synthetic queries cheap
    pub const SMALL: (u32, u32) = (64, 48);

    /// Not yet laid out
    pub const ZERO: (u32, u32) = (0, 0);
}

/// A synthetic dataset behind the trait object views consume.
pub fn synthetic(dims: &[u64]) -> Arc<dyn Dataset> {
    Arc::new(SyntheticDataset::new(dims.to_vec()))
}

/// A synthetic dataset exposing `timesteps` timesteps.
pub fn synthetic_with_timesteps(dims: &[u64], timesteps: i64) -> Arc<dyn Dataset> {
    Arc::new(SyntheticDataset::new(dims.to_vec()).with_timesteps(timesteps))
}
