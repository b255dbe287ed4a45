//! Error types for the leader and router roles.

use serde::Serialize;
use std::fmt;
use telemesh_core::ErrorCategory;
use telemesh_mesh::AggregateError;
use thiserror::Error;

/// Why one leaf could not be gathered.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum LeafFailure {
    /// Candidate resolution refused (strict mode without a mesh address)
    Config {
        /// Leaf name
        leaf: String,
        /// Resolver message
        message: String,
    },
    /// Every candidate failed
    Unreachable(AggregateError),
}

impl LeafFailure {
    /// Name of the failed leaf.
    pub fn leaf(&self) -> &str {
        match self {
            LeafFailure::Config { leaf, .. } => leaf,
            LeafFailure::Unreachable(agg) => &agg.target,
        }
    }
}

impl fmt::Display for LeafFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeafFailure::Config { message, .. } => f.write_str(message),
            LeafFailure::Unreachable(agg) => write!(f, "{}", agg),
        }
    }
}

/// Leader gather failures.
#[derive(Debug, Error)]
pub enum GatherError {
    /// Caller presented the wrong key
    #[error("invalid key")]
    Authentication,

    /// One or more leaves failed; partial results are discarded
    #[error("gather failed: {}", join(.0))]
    Leaves(Vec<LeafFailure>),
}

impl GatherError {
    /// Error class for HTTP mapping.
    pub fn category(&self) -> ErrorCategory {
        match self {
            GatherError::Authentication => ErrorCategory::Authentication,
            GatherError::Leaves(failures) => {
                if failures
                    .iter()
                    .any(|f| matches!(f, LeafFailure::Config { .. }))
                {
                    ErrorCategory::Configuration
                } else {
                    ErrorCategory::Transport
                }
            }
        }
    }

    /// Names of the leaves that failed.
    pub fn failed_leaves(&self) -> Vec<&str> {
        match self {
            GatherError::Authentication => Vec::new(),
            GatherError::Leaves(failures) => failures.iter().map(LeafFailure::leaf).collect(),
        }
    }
}

fn join(failures: &[LeafFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Router failures.
#[derive(Debug, Error)]
pub enum RouteError {
    /// Caller presented the wrong key
    #[error("invalid key")]
    Authentication,

    /// Leader address could not be resolved under the configured policy
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Every leader candidate failed
    #[error("{0}")]
    LeaderUnreachable(AggregateError),
}

impl RouteError {
    /// Error class for HTTP mapping.
    pub fn category(&self) -> ErrorCategory {
        match self {
            RouteError::Authentication => ErrorCategory::Authentication,
            RouteError::Configuration(_) => ErrorCategory::Configuration,
            RouteError::LeaderUnreachable(agg) if agg.is_unauthorized() => {
                ErrorCategory::Authentication
            }
            RouteError::LeaderUnreachable(_) => ErrorCategory::Transport,
        }
    }
}

/// Result type for the leader.
pub type GatherResult<T> = Result<T, GatherError>;

/// Result type for the router.
pub type RouteResult<T> = Result<T, RouteError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use telemesh_mesh::{AttemptFailure, MeshError};

    #[test]
    fn test_gather_error_lists_every_failed_leaf() {
        let err = GatherError::Leaves(vec![
            LeafFailure::Unreachable(AggregateError::new(
                "battery",
                vec![AttemptFailure::new(
                    "http://[fd00::3]:5683/battery",
                    &MeshError::Timeout(Duration::from_secs(1)),
                )],
            )),
            LeafFailure::Config {
                leaf: "gps".to_string(),
                message: "mesh address missing for gps: /run/gps.addr".to_string(),
            },
        ]);

        let text = err.to_string();
        assert!(text.starts_with("gather failed: battery unreachable;"));
        assert!(text.contains("; mesh address missing for gps"));
        assert_eq!(err.failed_leaves(), vec!["battery", "gps"]);
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_route_error_categories() {
        assert_eq!(RouteError::Authentication.category(), ErrorCategory::Authentication);

        let refused = AggregateError::new(
            "leader",
            vec![AttemptFailure::new("http://leader/collect", &MeshError::Unauthorized)],
        );
        assert_eq!(
            RouteError::LeaderUnreachable(refused).category(),
            ErrorCategory::Authentication
        );

        let down = AggregateError::new(
            "leader",
            vec![AttemptFailure::new(
                "http://leader/collect",
                &MeshError::Timeout(Duration::from_secs(4)),
            )],
        );
        let err = RouteError::LeaderUnreachable(down);
        assert_eq!(err.category(), ErrorCategory::Transport);
        assert!(err.to_string().starts_with("leader unreachable;"));
    }
}
