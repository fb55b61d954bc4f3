//! Building transforms from physical extents.

use slice_common::{AffineAxis, SliceError, SliceResult};

/// Affine axis mapping the logical interval `[a, b]` onto `[lo, hi]`.
pub fn linear_mapping(a: f64, b: f64, lo: f64, hi: f64) -> SliceResult<AffineAxis> {
    if b == a {
        return Err(SliceError::InvalidBox(format!(
            "empty logical interval [{a}, {b}]"
        )));
    }
    let scale = (hi - lo) / (b - a);
    Ok(AffineAxis::new(lo - a * scale, scale))
}

/// Derive the per-axis transform that stretches `[0, dims[i]]` over
/// `physic[i] = (A, B)`.
pub fn transform_from_physic_box(
    dims: &[u64],
    physic: &[(f64, f64)],
) -> SliceResult<Vec<AffineAxis>> {
    if dims.len() != physic.len() {
        return Err(SliceError::dimension_mismatch(dims.len(), physic.len()));
    }
    dims.iter()
        .zip(physic)
        .map(|(&d, &(lo, hi))| linear_mapping(0.0, d as f64, lo, hi))
        .collect()
}

/// Physical extent `(A, B)` of each axis for a dataset of logical size `dims`.
pub fn physic_box(dims: &[u64], transform: &[AffineAxis]) -> SliceResult<Vec<(f64, f64)>> {
    if dims.len() != transform.len() {
        return Err(SliceError::dimension_mismatch(dims.len(), transform.len()));
    }
    Ok(dims
        .iter()
        .zip(transform)
        .map(|(&d, axis)| (axis.to_physic(0.0), axis.to_physic(d as f64)))
        .collect())
}
