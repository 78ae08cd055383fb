//! Shared test utilities for the gee-client workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Canned backend payloads (regions, geometry, analysis responses)
//! - A local mock backend built on axum
//! - Approximate float assertions
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
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, MockBackend};
//! ```

pub mod fixtures;
pub mod mock_backend;

pub use mock_backend::MockBackend;

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

/// Macro for approximate equality of (lon, lat) pairs.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_coords_approx_eq;
///
/// assert_coords_approx_eq!((107.6, -6.9), (107.6001, -6.9001), 0.001);
/// ```
#[macro_export]
macro_rules! assert_coords_approx_eq {
    (($x1:expr, $y1:expr), ($x2:expr, $y2:expr), $epsilon:expr) => {{
        $crate::assert_approx_eq!($x1, $x2, $epsilon);
        $crate::assert_approx_eq!($y1, $y2, $epsilon);
    }};
}
