//! Common types and utilities shared across the windy crates.

pub mod component;
pub mod cycle;
pub mod error;
pub mod grid;

pub use component::{ComponentSpec, WIND_COMPONENTS};
pub use cycle::{Cycle, CycleParseError, CYCLE_STEP_HOURS};
pub use error::{ErrorKind, FetchError, FetchResult, WindError, WindResult};
pub use grid::{Precision, WindGrid};
