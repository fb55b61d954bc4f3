//! Shared test utilities for the slice viewer workspace.
//!
//! This crate provides common testing infrastructure including:
//! - A scripted dataset with controllable steps, delays and failures
//! - Dataset and canvas fixtures
//! - Async wait helpers for schedulers and views
//! - Callback recorders
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your integration tests:
//!
//! ```ignore
//! use test_utils::{fixtures, ScriptedDataset, drain_until_terminal};
//! ```

pub mod fixtures;
pub mod recorder;
pub mod scripted;
pub mod wait;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use recorder::Recorder;
pub use scripted::ScriptedDataset;
pub use wait::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Approximate equality of two physical boxes, corner by corner.
///
/// ```ignore
/// assert_box_approx_eq!(view.get_viewport(), PhysicalBox::new([0.0, 0.0], [1.0, 1.0]), 1e-9);
/// ```
#[macro_export]
macro_rules! assert_box_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left = $left;
        let right = $right;
        for i in 0..2 {
            $crate::assert_approx_eq!(left.p1[i], right.p1[i], $epsilon);
            $crate::assert_approx_eq!(left.p2[i], right.p2[i], $epsilon);
        }
    }};
}

#[cfg(test)]
mod tests {
    use slice_common::PhysicalBox;

    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    fn test_assert_box_approx_eq_passes() {
        let a = PhysicalBox::new([0.0, 0.0], [2.0, 1.0]);
        let b = PhysicalBox::new([0.00001, 0.0], [2.0, 0.99999]);
        assert_box_approx_eq!(a, b, 0.001);
    }
}
