//! Shared test utilities for the windy workspace.
//!
//! This crate provides common testing infrastructure including:
//! - An in-process GFS mirror with range support ([`MockMirror`])
//! - A fake `gribber` decoder ([`FakeDecoder`])
//! - Synthetic GRIB files and `.idx` indexes
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
//! Use it from integration tests under `tests/` only; unit tests see a
//! separately compiled copy of the crate under test.

pub mod decoder;
pub mod generators;
pub mod mirror;

pub use decoder::*;
pub use generators::*;
pub use mirror::*;

/// Assert two wind values (any float type) are within `tolerance`.
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(grid.get(0, 0).unwrap()[0], 15.0, 1e-6);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($actual:expr, $expected:expr, $tolerance:expr) => {{
        let (actual, expected, tolerance) = ($actual as f64, $expected as f64, $tolerance as f64);
        assert!(
            (actual - expected).abs() <= tolerance,
            "{} = {actual} is not within {tolerance} of {expected}",
            stringify!($actual),
        );
    }};
}
