//! Error types for the tracking backend.

use telemesh_core::{ErrorCategory, ValidationError};
use telemesh_mesh::AggregateError;
use thiserror::Error;

/// Storage failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite error
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Write targeted a session that does not exist
    #[error("session not found: {0}")]
    SessionMissing(String),
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of one call to the router.
#[derive(Debug, Error)]
pub enum RouterCallError {
    /// Router address could not be resolved under the configured policy
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Router refused the shared key on every candidate
    #[error("router rejected key: {0}")]
    Unauthorized(AggregateError),

    /// Every router candidate failed
    #[error("{0}")]
    Unreachable(AggregateError),

    /// Router answered with something that is not a canonical reading
    #[error("malformed reading: {0}")]
    Decode(String),
}

impl RouterCallError {
    /// Network-level failures may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RouterCallError::Unreachable(_) | RouterCallError::Decode(_))
    }
}

/// Collection and session failures.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// No session given and none is current
    #[error("no session selected")]
    NoSession,

    /// Unknown session id
    #[error("session not found: {0}")]
    NotFound(String),

    /// Reading failed range checks
    #[error("invalid reading: {0}")]
    Validation(#[from] ValidationError),

    /// Payload is not a canonical reading
    #[error("malformed reading: {0}")]
    Malformed(String),

    /// Key refused somewhere along the path
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Resolution refused under the configured policy
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Retries exhausted; carries the last error
    #[error("collection unavailable: {0}")]
    Unavailable(String),

    /// Storage failure
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl TrackingError {
    /// Error class for HTTP mapping.
    pub fn category(&self) -> ErrorCategory {
        match self {
            TrackingError::NoSession => ErrorCategory::NoSession,
            TrackingError::NotFound(_) => ErrorCategory::NotFound,
            TrackingError::Validation(_) | TrackingError::Malformed(_) => {
                ErrorCategory::Validation
            }
            TrackingError::Authentication(_) => ErrorCategory::Authentication,
            TrackingError::Configuration(_) => ErrorCategory::Configuration,
            TrackingError::Unavailable(_) => ErrorCategory::Transport,
            TrackingError::Persistence(StoreError::SessionMissing(_)) => ErrorCategory::NotFound,
            TrackingError::Persistence(_) => ErrorCategory::Persistence,
        }
    }
}

impl From<RouterCallError> for TrackingError {
    fn from(err: RouterCallError) -> Self {
        match err {
            RouterCallError::Configuration(msg) => TrackingError::Configuration(msg),
            RouterCallError::Unauthorized(agg) => TrackingError::Authentication(agg.to_string()),
            other => TrackingError::Unavailable(other.to_string()),
        }
    }
}

/// Result type for tracking operations.
pub type TrackingResult<T> = Result<T, TrackingError>;
