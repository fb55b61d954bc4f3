//! Per-axis affine transform, slicing direction and offset range.

use serde::{Deserialize, Serialize};

use crate::error::{SliceError, SliceResult};

/// Affine mapping for one axis: `physic = translate + scale * logic`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineAxis {
    pub translate: f64,
    pub scale: f64,
}

impl AffineAxis {
    pub fn new(translate: f64, scale: f64) -> Self {
        Self { translate, scale }
    }

    /// The identity mapping (translate 0, scale 1).
    pub fn identity() -> Self {
        Self::new(0.0, 1.0)
    }

    pub fn is_identity(&self) -> bool {
        self.translate == 0.0 && self.scale == 1.0
    }

    /// Map a logical coordinate to physical space.
    pub fn to_physic(&self, logic: f64) -> f64 {
        self.translate + self.scale * logic
    }

    /// Map a physical coordinate back to logical space.
    ///
    /// `axis` is only used to label the error.
    pub fn to_logic(&self, physic: f64, axis: usize) -> SliceResult<f64> {
        if self.scale == 0.0 {
            return Err(SliceError::degenerate(axis));
        }
        Ok((physic - self.translate) / self.scale)
    }
}

impl Default for AffineAxis {
    fn default() -> Self {
        Self::identity()
    }
}

/// The logical axis orthogonal to the displayed slice.
///
/// Only meaningful for 3D data; 2D data always uses axis 2 by convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Direction(usize);

impl Direction {
    pub const X: Direction = Direction(0);
    pub const Y: Direction = Direction(1);
    pub const Z: Direction = Direction(2);

    /// Create a direction, rejecting anything outside `{0, 1, 2}`.
    pub fn new(axis: usize) -> SliceResult<Self> {
        if axis > 2 {
            return Err(SliceError::InvalidDirection(axis));
        }
        Ok(Self(axis))
    }

    pub fn axis(&self) -> usize {
        self.0
    }

    /// Logical axes shown on screen as (horizontal, vertical) for 3D data.
    pub fn plane_axes(&self) -> (usize, usize) {
        match self.0 {
            0 => (1, 2),
            1 => (0, 2),
            _ => (0, 1),
        }
    }
}

impl Default for Direction {
    fn default() -> Self {
        Direction::Z
    }
}

/// Legal range of the slice offset, in physical units.
///
/// `step == 0.0` means continuous; `step == 1.0` with integral bounds means
/// the offset is aligned to logical indices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OffsetRange {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl OffsetRange {
    pub fn new(start: f64, end: f64, step: f64) -> Self {
        Self { start, end, step }
    }

    /// Range used for 2D data where there is no slicing axis.
    pub fn flat() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }

    /// Whether every bound is an integer, so offsets should be too.
    pub fn is_discrete(&self) -> bool {
        self.step != 0.0
            && [self.start, self.end, self.step]
                .iter()
                .all(|v| v.fract() == 0.0)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.start && value <= self.end
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.start).min(self.end)
    }
}
