//! Core error types and the failure taxonomy shared by every hop.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core error type for telemesh
#[derive(Debug, Error)]
pub enum CoreError {
    /// Shared-secret mismatch
    #[error("invalid key")]
    Authentication,
}

/// Which class of failure a request ended in.
///
/// Callers use the category to decide whether a failure is worth retrying:
/// only `Transport` is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Missing mesh address in strict mode, bad config values.
    Configuration,
    /// Shared-secret mismatch.
    Authentication,
    /// Every candidate for a hop failed, or the hop is otherwise unreachable.
    Transport,
    /// Reading out of physical range or incomplete.
    Validation,
    /// Unknown session.
    NotFound,
    /// No explicit session and no current session.
    NoSession,
    /// Storage write or read failure.
    Persistence,
}

impl ErrorCategory {
    /// Whether a failure of this category may succeed on a later attempt.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorCategory::Transport)
    }

    /// HTTP status a service answers with for this category.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorCategory::NotFound => 404,
            ErrorCategory::NoSession => 409,
            ErrorCategory::Authentication => 401,
            ErrorCategory::Validation => 422,
            ErrorCategory::Transport => 503,
            ErrorCategory::Configuration | ErrorCategory::Persistence => 500,
        }
    }
}

/// JSON body returned by every service on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message. Never contains the shared secret.
    pub error: String,
    /// Failure class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ErrorCategory>,
}

impl ErrorBody {
    /// Build a body from a message and category.
    pub fn new(error: impl Into<String>, category: ErrorCategory) -> Self {
        Self {
            error: error.into(),
            category: Some(category),
        }
    }
}
