//! Error types for mesh hops.
//!
//! A single attempt fails with a [`MeshError`]. When every candidate for a hop
//! has failed, the caller gets an [`AggregateError`] carrying each attempt in
//! order, so the whole path can be diagnosed rather than only the last hop.

use serde::Serialize;
use std::fmt;
use telemesh_core::ErrorCategory;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur on a single mesh attempt.
#[derive(Debug, Error)]
pub enum MeshError {
    /// Configuration errors (strict mode without a mesh address)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Attempt exceeded its budget
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Connection, DNS or protocol failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Peer refused the shared key
    #[error("unauthorized")]
    Unauthorized,

    /// Peer answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Message from the peer's error body
        message: String,
        /// Failure class the peer reported, if its body carried one
        category: Option<ErrorCategory>,
    },

    /// Response body was not the expected JSON
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Response was well-formed but unacceptable
    #[error("rejected: {0}")]
    Rejected(String),
}

impl MeshError {
    /// Failure class of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            MeshError::Config(_) => FailureKind::Config,
            MeshError::Timeout(_) => FailureKind::Timeout,
            MeshError::Transport(_) => FailureKind::Transport,
            MeshError::Unauthorized => FailureKind::Unauthorized,
            MeshError::Status {
                category: Some(ErrorCategory::Configuration),
                ..
            } => FailureKind::Config,
            MeshError::Status { .. } => FailureKind::Status,
            MeshError::Decode(_) => FailureKind::Decode,
            MeshError::Rejected(_) => FailureKind::Rejected,
        }
    }
}

/// Result type for mesh operations.
pub type MeshResult<T> = Result<T, MeshError>;

/// Failure class recorded for each attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Configuration problem
    Config,
    /// Attempt timed out
    Timeout,
    /// Network-level failure
    Transport,
    /// Shared key refused
    Unauthorized,
    /// Non-success status
    Status,
    /// Bad body
    Decode,
    /// Application-level rejection
    Rejected,
}

/// One failed attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptFailure {
    /// Candidate URL that was tried
    pub candidate: String,
    /// Failure class
    pub kind: FailureKind,
    /// Error text
    pub message: String,
}

impl AttemptFailure {
    /// Record a failure for a candidate.
    pub fn new(candidate: impl Into<String>, error: &MeshError) -> Self {
        Self {
            candidate: candidate.into(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Every candidate for a hop failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateError {
    /// Logical target (gps, leader, router, ...)
    pub target: String,
    /// Failed attempts in the order they were made
    pub attempts: Vec<AttemptFailure>,
}

impl AggregateError {
    /// Build from the ordered attempt list.
    pub fn new(target: impl Into<String>, attempts: Vec<AttemptFailure>) -> Self {
        Self {
            target: target.into(),
            attempts,
        }
    }

    /// True when every attempt was refused for a bad key.
    pub fn is_unauthorized(&self) -> bool {
        !self.attempts.is_empty()
            && self
                .attempts
                .iter()
                .all(|a| a.kind == FailureKind::Unauthorized)
    }

    /// True when any attempt failed on configuration, locally or as reported
    /// by the peer. Another attempt would fail the same way.
    pub fn is_configuration(&self) -> bool {
        self.attempts.iter().any(|a| a.kind == FailureKind::Config)
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} unreachable; ", self.target)?;
        if self.attempts.is_empty() {
            return f.write_str("no candidates");
        }
        for (i, attempt) in self.attempts.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{} -> {}", attempt.candidate, attempt.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}
