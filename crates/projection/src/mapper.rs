//! Projection and unprojection between logical and physical space.

use slice_common::{
    AffineAxis, Direction, LogicalBox, OffsetRange, PhysicalBox, SliceError, SliceResult,
};

use crate::linear::physic_box;

/// Affine mapping for one view, plus the slicing axis and slice offset used
/// to drop and rebuild the third dimension of 3D data.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateMapper {
    transform: Vec<AffineAxis>,
    direction: Direction,
    /// Position of the slice plane along `direction`, in physical units.
    offset: f64,
}

/// 2D identity mapping, used before any dataset is bound.
impl Default for CoordinateMapper {
    fn default() -> Self {
        Self {
            transform: vec![AffineAxis::identity(); 2],
            direction: Direction::Z,
            offset: 0.0,
        }
    }
}

impl CoordinateMapper {
    /// Create a mapper. `transform` has one axis per logical dimension (2 or 3).
    pub fn new(transform: Vec<AffineAxis>, direction: Direction, offset: f64) -> SliceResult<Self> {
        match transform.len() {
            2 | 3 => Ok(Self {
                transform,
                direction,
                offset,
            }),
            n => Err(SliceError::dimension_mismatch(3, n)),
        }
    }

    /// Identity transform over `pdim` axes, slicing along Z.
    pub fn identity(pdim: usize) -> SliceResult<Self> {
        Self::new(vec![AffineAxis::identity(); pdim], Direction::Z, 0.0)
    }

    pub fn point_dim(&self) -> usize {
        self.transform.len()
    }

    pub fn transform(&self) -> &[AffineAxis] {
        &self.transform
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn set_offset(&mut self, offset: f64) {
        self.offset = offset;
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    /// Replace the transform. The number of axes must not change.
    pub fn set_transform(&mut self, transform: Vec<AffineAxis>) -> SliceResult<()> {
        if transform.len() != self.transform.len() {
            return Err(SliceError::dimension_mismatch(
                self.transform.len(),
                transform.len(),
            ));
        }
        self.transform = transform;
        Ok(())
    }

    fn is_3d(&self) -> bool {
        self.transform.len() == 3
    }

    fn is_identity(&self) -> bool {
        self.transform.iter().all(AffineAxis::is_identity)
    }

    /// Map a logical point to physical space, dropping the slicing axis for 3D data.
    pub fn project_point(&self, logic: &[f64]) -> SliceResult<[f64; 2]> {
        if logic.len() != self.point_dim() {
            return Err(SliceError::dimension_mismatch(self.point_dim(), logic.len()));
        }

        let mut physic: Vec<f64> = logic
            .iter()
            .zip(&self.transform)
            .map(|(&v, axis)| axis.to_physic(v))
            .collect();

        if self.is_3d() {
            physic.remove(self.direction.axis());
        }

        Ok([physic[0], physic[1]])
    }

    /// Map a logical box to physical space.
    pub fn project_box(&self, logic: &LogicalBox) -> SliceResult<PhysicalBox> {
        let p1 = self.project_point(&logic.p1)?;
        let p2 = self.project_point(&logic.p2)?;
        Ok(PhysicalBox::new(p1, p2))
    }

    /// Map a physical point back to logical space.
    ///
    /// For 3D data the slicing-axis coordinate is not taken from the input:
    /// it is rebuilt from the current offset and truncated to a slice index.
    pub fn unproject_point(&self, physic: [f64; 2]) -> SliceResult<Vec<f64>> {
        let mut values = physic.to_vec();
        if self.is_3d() {
            values.insert(self.direction.axis(), 0.0);
        }

        let mut logic = values
            .iter()
            .zip(&self.transform)
            .enumerate()
            .map(|(i, (&v, axis))| axis.to_logic(v, i))
            .collect::<SliceResult<Vec<f64>>>()?;

        if self.is_3d() {
            let dir = self.direction.axis();
            logic[dir] = self.transform[dir].to_logic(self.offset, dir)?.trunc();
        }

        Ok(logic)
    }

    /// Map a physical box back to logical space.
    ///
    /// For 3D data the far corner's slicing coordinate is bumped by one so the
    /// result covers exactly one slice (half-open on that axis).
    pub fn unproject_box(&self, physic: &PhysicalBox) -> SliceResult<LogicalBox> {
        let p1 = self.unproject_point(physic.p1)?;
        let mut p2 = self.unproject_point(physic.p2)?;
        if self.is_3d() {
            p2[self.direction.axis()] += 1.0;
        }
        LogicalBox::from_corners(p1, p2)
    }

    /// Default offset and legal offset range for the current direction.
    ///
    /// An identity transform gives an index-aligned range `[0, extent - 1]`
    /// with the integer midpoint as default. Otherwise the range is the
    /// continuous physical extent along the direction (step 0).
    pub fn guess_offset(&self, logic_size: &[u64]) -> SliceResult<(f64, OffsetRange)> {
        if !self.is_3d() {
            return Ok((0.0, OffsetRange::flat()));
        }
        if logic_size.len() != 3 {
            return Err(SliceError::dimension_mismatch(3, logic_size.len()));
        }

        let dir = self.direction.axis();
        if self.is_identity() {
            let extent = logic_size[dir];
            let value = (extent / 2) as f64;
            return Ok((
                value,
                OffsetRange::new(0.0, extent.saturating_sub(1) as f64, 1.0),
            ));
        }

        let (a, b) = physic_box(logic_size, &self.transform)?[dir];
        let (lo, hi) = (a.min(b), a.max(b));
        Ok(((lo + hi) / 2.0, OffsetRange::new(lo, hi, 0.0)))
    }

    /// Logical slice index the current offset falls on, or 0 for 2D data.
    pub fn logic_offset(&self) -> SliceResult<f64> {
        if !self.is_3d() {
            return Ok(0.0);
        }
        let dir = self.direction.axis();
        Ok(self.transform[dir].to_logic(self.offset, dir)?.trunc())
    }

    /// Physical position of a logical slice index along the direction.
    pub fn physic_offset_of(&self, logic_index: f64) -> f64 {
        if !self.is_3d() {
            return 0.0;
        }
        self.transform[self.direction.axis()].to_physic(logic_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::assert_approx_eq;

    fn mapper_3d(dir: usize, offset: f64) -> CoordinateMapper {
        CoordinateMapper::new(
            vec![
                AffineAxis::new(10.0, 0.5),
                AffineAxis::new(-4.0, 2.0),
                AffineAxis::new(1.0, 3.0),
            ],
            Direction::new(dir).unwrap(),
            offset,
        )
        .unwrap()
    }

    #[test]
    fn test_project_drops_direction_axis() {
        let m = mapper_3d(1, 0.0);
        let p = m.project_point(&[4.0, 100.0, 2.0]).unwrap();
        assert_eq!(p, [12.0, 7.0]);
    }

    #[test]
    fn test_project_2d_keeps_both_axes() {
        let m = CoordinateMapper::new(
            vec![AffineAxis::new(1.0, 2.0), AffineAxis::new(0.0, 1.0)],
            Direction::Z,
            0.0,
        )
        .unwrap();
        assert_eq!(m.project_point(&[3.0, 4.0]).unwrap(), [7.0, 4.0]);
    }

    #[test]
    fn test_unproject_uses_offset_for_direction() {
        // offset 16 -> (16 - 1) / 3 = 5
        let m = mapper_3d(2, 16.0);
        let logic = m.unproject_point([12.0, 0.0]).unwrap();
        assert_eq!(logic, vec![4.0, 2.0, 5.0]);
    }

    #[test]
    fn test_unproject_box_is_half_open_on_direction() {
        let m = mapper_3d(0, 11.0);
        let b = m
            .unproject_box(&PhysicalBox::new([-4.0, 1.0], [16.0, 31.0]))
            .unwrap();
        assert_eq!(b.p1, vec![2.0, 0.0, 0.0]);
        assert_eq!(b.p2, vec![3.0, 10.0, 10.0]);
    }

    #[test]
    fn test_roundtrip_except_direction() {
        for dir in 0..3 {
            let m = mapper_3d(dir, 0.0);
            let b = LogicalBox::new(vec![2.0, 6.0, 8.0], vec![30.0, 40.0, 50.0]).unwrap();
            let back = m.unproject_box(&m.project_box(&b).unwrap()).unwrap();
            for axis in (0..3).filter(|&a| a != dir) {
                assert_approx_eq!(back.p1[axis], b.p1[axis], 1e-9);
                assert_approx_eq!(back.p2[axis], b.p2[axis], 1e-9);
            }
        }
    }

    #[test]
    fn test_zero_scale_fails_unprojection() {
        let m = CoordinateMapper::new(
            vec![AffineAxis::new(0.0, 0.0), AffineAxis::identity()],
            Direction::Z,
            0.0,
        )
        .unwrap();
        assert_eq!(
            m.unproject_point([1.0, 1.0]),
            Err(SliceError::DegenerateTransform { axis: 0 })
        );
        // projection never divides
        assert!(m.project_point(&[1.0, 1.0]).is_ok());
    }

    #[test]
    fn test_guess_offset_identity() {
        let m = CoordinateMapper::new(vec![AffineAxis::identity(); 3], Direction::X, 0.0).unwrap();
        let (value, range) = m.guess_offset(&[300, 200, 100]).unwrap();
        assert_eq!(value, 150.0);
        assert_eq!(range, OffsetRange::new(0.0, 299.0, 1.0));
    }

    #[test]
    fn test_guess_offset_scaled_is_continuous() {
        let m = mapper_3d(2, 0.0);
        let (value, range) = m.guess_offset(&[10, 10, 10]).unwrap();
        assert_eq!(range, OffsetRange::new(1.0, 31.0, 0.0));
        assert_eq!(value, 16.0);
    }

    #[test]
    fn test_guess_offset_2d() {
        let m = CoordinateMapper::identity(2).unwrap();
        let (value, range) = m.guess_offset(&[64, 64]).unwrap();
        assert_eq!(value, 0.0);
        assert_eq!(range, OffsetRange::flat());
    }

    #[test]
    fn test_rejects_bad_dimension() {
        assert!(CoordinateMapper::identity(4).is_err());
        let m = CoordinateMapper::identity(3).unwrap();
        assert!(m.project_point(&[1.0, 2.0]).is_err());
    }
}
