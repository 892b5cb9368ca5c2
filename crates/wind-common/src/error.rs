//! Error types for the windy crates.
//!
//! Two levels are kept apart:
//! - [`FetchError`] describes a single network/decoder operation and tells
//!   the retry engine whether to fall back to an older cycle or retry.
//! - [`WindError`] is what an update attempt as a whole fails with.

use std::time::Duration;

use thiserror::Error;

use crate::Cycle;

/// Result type alias using FetchError.
pub type FetchResult<T> = Result<T, FetchError>;

/// Result type alias using WindError.
pub type WindResult<T> = Result<T, WindError>;

/// Failure of a single remote fetch or decode step.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The requested cycle (or file) does not exist upstream yet.
    #[error("not found: {0}")]
    NotFound(String),

    /// Network, status or protocol-capability failure. Worth retrying.
    #[error("{0}")]
    Transient(String),

    /// The remote index or decoder output could not be parsed.
    #[error("parse: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound(_))
    }
}

/// Broad classification used for logging, metrics and HTTP reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Transient,
    InvalidConfig,
    DeadlineExceeded,
    InternalFault,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Transient => "transient",
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::DeadlineExceeded => "deadline_exceeded",
            ErrorKind::InternalFault => "internal_fault",
        }
    }
}

/// Primary error type for wind data updates.
#[derive(Debug, Error)]
pub enum WindError {
    // === Configuration ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Per-attempt data errors ===
    #[error("{description} {component} not found in index for {path:?}")]
    ComponentNotFound {
        description: &'static str,
        component: String,
        path: String,
    },

    #[error("duplicate point ({lat}, {lng}) -> ({lat_idx}, {lng_idx})")]
    DuplicatePoint {
        lat: f64,
        lng: f64,
        lat_idx: usize,
        lng_idx: usize,
    },

    #[error("point ({lat}, {lng}) is outside the {lat_dim}x{lng_dim} grid")]
    PointOutOfBounds {
        lat: f64,
        lng: f64,
        lat_dim: usize,
        lng_dim: usize,
    },

    #[error("expected {expected} points for {lat_dim}x{lng_dim} grid (prec {precision:.2}) for {component}, got {got}")]
    IncompleteGrid {
        component: String,
        expected: usize,
        lat_dim: usize,
        lng_dim: usize,
        precision: f64,
        got: usize,
    },

    #[error("{context}: {error}")]
    Fetch {
        context: String,
        #[source]
        error: FetchError,
    },

    // === Terminal update errors ===
    #[error("no gfs data found after {cycle} ({prev} update cycles ago)")]
    NoData { cycle: Cycle, prev: u32 },

    #[error("failed to get gfs data ({retries} retries): {last}")]
    RetriesExhausted {
        retries: u32,
        #[source]
        last: Box<WindError>,
    },

    #[error("update timed out after {0:?}")]
    Timeout(Duration),

    // === Infrastructure ===
    #[error("Rendering failed: {0}")]
    Render(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WindError {
    /// Wrap a fetch failure with the operation it happened in.
    pub fn fetch(context: impl Into<String>, error: FetchError) -> Self {
        WindError::Fetch {
            context: context.into(),
            error,
        }
    }

    /// Whether the failure means the cycle is not published (yet).
    pub fn is_not_found(&self) -> bool {
        matches!(self, WindError::Fetch { error, .. } if error.is_not_found())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            WindError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            WindError::Fetch { error, .. } => match error {
                FetchError::NotFound(_) => ErrorKind::NotFound,
                FetchError::Transient(_) => ErrorKind::Transient,
                FetchError::Malformed(_) => ErrorKind::InternalFault,
            },
            WindError::NoData { .. } => ErrorKind::NotFound,
            WindError::RetriesExhausted { last, .. } => last.kind(),
            WindError::Timeout(_) => ErrorKind::DeadlineExceeded,
            WindError::ComponentNotFound { .. }
            | WindError::DuplicatePoint { .. }
            | WindError::PointOutOfBounds { .. }
            | WindError::IncompleteGrid { .. }
            | WindError::Render(_)
            | WindError::Internal(_) => ErrorKind::InternalFault,
        }
    }
}
