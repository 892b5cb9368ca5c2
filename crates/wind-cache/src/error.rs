use std::sync::Arc;

use thiserror::Error;
use wind_common::{ErrorKind, WindError};

/// Why the most recent refresh failed.
///
/// Cheap to clone; every reader of the cache gets a copy.
#[derive(Debug, Clone, Error)]
pub enum RefreshError {
    #[error("{message}")]
    Failed { kind: ErrorKind, message: Arc<str> },

    #[error("refresh panicked: {0}")]
    Panicked(Arc<str>),

    #[error("refresh was abandoned before completing")]
    Abandoned,
}

impl RefreshError {
    pub fn new(kind: ErrorKind, message: impl Into<Arc<str>>) -> Self {
        RefreshError::Failed {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RefreshError::Failed { kind, .. } => *kind,
            RefreshError::Panicked(_) | RefreshError::Abandoned => ErrorKind::InternalFault,
        }
    }
}

impl From<WindError> for RefreshError {
    fn from(err: WindError) -> Self {
        RefreshError::new(err.kind(), err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CacheError {
    /// No refresh has completed yet and the deadline passed.
    #[error("initial data update not complete yet")]
    NotYetAvailable,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_from_wind_error_keeps_kind_and_message() {
        let err = RefreshError::from(WindError::Timeout(Duration::from_secs(100)));
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
        assert_eq!(err.to_string(), "update timed out after 100s");
    }

    #[test]
    fn test_panics_are_internal_faults() {
        assert_eq!(RefreshError::Panicked("boom".into()).kind(), ErrorKind::InternalFault);
        assert_eq!(RefreshError::Abandoned.kind(), ErrorKind::InternalFault);
    }
}
