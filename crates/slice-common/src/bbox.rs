//! Box types in logical (index) and physical (display) space.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{SliceError, SliceResult};

/// A box in dataset index space.
///
/// `p1` and `p2` carry one coordinate per logical dimension and satisfy
/// `p1[i] <= p2[i]`. On the slicing axis of 3D data the far corner is
/// exclusive, so a single slice has `p2[dir] == p1[dir] + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalBox {
    pub p1: Vec<f64>,
    pub p2: Vec<f64>,
}

impl LogicalBox {
    /// Create a box, checking that both corners agree on dimension and order.
    pub fn new(p1: Vec<f64>, p2: Vec<f64>) -> SliceResult<Self> {
        if p1.len() != p2.len() {
            return Err(SliceError::dimension_mismatch(p1.len(), p2.len()));
        }
        if let Some(axis) = (0..p1.len()).find(|&i| p1[i] > p2[i]) {
            return Err(SliceError::InvalidBox(format!(
                "p1[{axis}]={} exceeds p2[{axis}]={}",
                p1[axis], p2[axis]
            )));
        }
        Ok(Self { p1, p2 })
    }

    /// Create a box from two arbitrary corners, ordering each axis.
    pub fn from_corners(a: Vec<f64>, b: Vec<f64>) -> SliceResult<Self> {
        if a.len() != b.len() {
            return Err(SliceError::dimension_mismatch(a.len(), b.len()));
        }
        let p1 = a.iter().zip(&b).map(|(x, y)| x.min(*y)).collect();
        let p2 = a.iter().zip(&b).map(|(x, y)| x.max(*y)).collect();
        Ok(Self { p1, p2 })
    }

    /// The box covering a whole dataset of the given logical size.
    pub fn full(dims: &[u64]) -> Self {
        Self {
            p1: vec![0.0; dims.len()],
            p2: dims.iter().map(|&d| d as f64).collect(),
        }
    }

    /// Number of logical dimensions.
    pub fn dim(&self) -> usize {
        self.p1.len()
    }

    /// Extent along each axis.
    pub fn extent(&self) -> Vec<f64> {
        self.p1.iter().zip(&self.p2).map(|(a, b)| b - a).collect()
    }

    /// Center along each axis.
    pub fn center(&self) -> Vec<f64> {
        self.p1
            .iter()
            .zip(&self.p2)
            .map(|(a, b)| 0.5 * (a + b))
            .collect()
    }

    /// Number of samples covered at full resolution.
    pub fn num_samples(&self) -> f64 {
        self.extent().iter().map(|e| e.max(0.0)).product()
    }

    /// Truncate every coordinate to an integer, the form sent to a backend.
    pub fn to_index_box(&self) -> (Vec<i64>, Vec<i64>) {
        (
            self.p1.iter().map(|v| v.trunc() as i64).collect(),
            self.p2.iter().map(|v| v.trunc() as i64).collect(),
        )
    }

    /// Compact form used in status lines: `[[0,0,5],[512,512,6]]`.
    pub fn compact(&self) -> String {
        let (p1, p2) = self.to_index_box();
        let join = |v: &[i64]| {
            v.iter()
                .map(|x| x.to_string())
                .collect::<Vec<_>>()
                .join(",")
        };
        format!("[[{}],[{}]]", join(&p1), join(&p2))
    }
}

impl fmt::Display for LogicalBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}-{:?}", self.p1, self.p2)
    }
}

/// A box in the 2D display space. Never carries the slicing axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalBox {
    pub p1: [f64; 2],
    pub p2: [f64; 2],
}

impl PhysicalBox {
    /// Create a box from two corners, ordering each axis.
    pub fn new(a: [f64; 2], b: [f64; 2]) -> Self {
        Self {
            p1: [a[0].min(b[0]), a[1].min(b[1])],
            p2: [a[0].max(b[0]), a[1].max(b[1])],
        }
    }

    /// Create a box from a center point and a size.
    pub fn from_center(center: [f64; 2], width: f64, height: f64) -> Self {
        Self::new(
            [center[0] - width / 2.0, center[1] - height / 2.0],
            [center[0] + width / 2.0, center[1] + height / 2.0],
        )
    }

    pub fn width(&self) -> f64 {
        self.p2[0] - self.p1[0]
    }

    pub fn height(&self) -> f64 {
        self.p2[1] - self.p1[1]
    }

    pub fn center(&self) -> [f64; 2] {
        [
            0.5 * (self.p1[0] + self.p2[0]),
            0.5 * (self.p1[1] + self.p2[1]),
        ]
    }

    /// Grow the box around its center so that
    /// `width / pixel_width == height / pixel_height`.
    ///
    /// Returns the box unchanged when either pixel dimension is zero.
    pub fn fit_aspect(&self, pixel_width: u32, pixel_height: u32) -> Self {
        if pixel_width == 0 || pixel_height == 0 {
            return *self;
        }
        let (pw, ph) = (pixel_width as f64, pixel_height as f64);
        let (mut w, mut h) = (self.width(), self.height());
        if w / pw > h / ph {
            h = (w / pw) * ph;
        } else {
            w = (h / ph) * pw;
        }
        Self::from_center(self.center(), w, h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_box_rejects_inverted_corners() {
        assert!(LogicalBox::new(vec![0.0, 5.0], vec![1.0, 2.0]).is_err());
        assert!(LogicalBox::new(vec![0.0], vec![1.0, 2.0]).is_err());
        assert!(LogicalBox::new(vec![0.0, 0.0], vec![1.0, 2.0]).is_ok());
    }

    #[test]
    fn test_logical_box_from_corners_orders_axes() {
        let b = LogicalBox::from_corners(vec![4.0, 0.0], vec![1.0, 3.0]).unwrap();
        assert_eq!(b.p1, vec![1.0, 0.0]);
        assert_eq!(b.p2, vec![4.0, 3.0]);
    }

    #[test]
    fn test_logical_box_measures() {
        let b = LogicalBox::full(&[512, 256, 10]);
        assert_eq!(b.extent(), vec![512.0, 256.0, 10.0]);
        assert_eq!(b.center(), vec![256.0, 128.0, 5.0]);
        assert_eq!(b.num_samples(), 512.0 * 256.0 * 10.0);
        assert_eq!(b.compact(), "[[0,0,0],[512,256,10]]");
    }

    #[test]
    fn test_physical_box_orders_corners() {
        let b = PhysicalBox::new([10.0, 8.0], [2.0, 4.0]);
        assert_eq!(b.p1, [2.0, 4.0]);
        assert_eq!(b.p2, [10.0, 8.0]);
        assert_eq!(b.width(), 8.0);
        assert_eq!(b.height(), 4.0);
    }

    #[test]
    fn test_fit_aspect_keeps_center() {
        let b = PhysicalBox::new([0.0, 0.0], [100.0, 100.0]);
        let fitted = b.fit_aspect(200, 100);
        assert_eq!(fitted.center(), b.center());
        assert!((fitted.width() / 200.0 - fitted.height() / 100.0).abs() < 1e-12);
        assert_eq!(fitted.width(), 200.0);
        assert_eq!(fitted.height(), 100.0);
    }

    #[test]
    fn test_fit_aspect_zero_size_is_noop() {
        let b = PhysicalBox::new([0.0, 0.0], [3.0, 1.0]);
        assert_eq!(b.fit_aspect(0, 100), b);
    }
}
