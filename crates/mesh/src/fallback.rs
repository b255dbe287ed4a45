//! Ordered fallback across candidates.
//!
//! Candidates are tried strictly in sequence. The first success wins and the
//! remaining candidates are never contacted. Each attempt runs under its own
//! timeout taken from the candidate.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{AggregateError, AttemptFailure, MeshError};
use crate::resolver::Candidate;
use crate::transport::MeshTransport;

/// Run `attempt` against each candidate in order until one succeeds.
///
/// An empty candidate list fails immediately with an empty aggregate.
pub async fn try_in_order<T, F, Fut>(
    target: &str,
    candidates: &[Candidate],
    mut attempt: F,
) -> Result<T, AggregateError>
where
    F: FnMut(Candidate) -> Fut,
    Fut: Future<Output = Result<T, MeshError>>,
{
    let mut failures = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let budget = candidate.timeout;
        let url = candidate.url.clone();
        let outcome = match tokio::time::timeout(budget, attempt(candidate.clone())).await {
            Ok(result) => result,
            Err(_) => Err(MeshError::Timeout(budget)),
        };

        match outcome {
            Ok(value) => {
                debug!(target, candidate = %url, tier = ?candidate.tier, "attempt succeeded");
                return Ok(value);
            }
            Err(e) => {
                warn!(target, candidate = %url, error = %e, "attempt failed");
                failures.push(AttemptFailure::new(url, &e));
            }
        }
    }

    Err(AggregateError::new(target, failures))
}

/// Transport calls wrapped in ordered fallback.
#[derive(Clone)]
pub struct FallbackCaller {
    transport: Arc<dyn MeshTransport>,
}

impl FallbackCaller {
    /// Create a caller over the given transport.
    pub fn new(transport: Arc<dyn MeshTransport>) -> Self {
        Self { transport }
    }

    /// Underlying transport.
    pub fn transport(&self) -> &Arc<dyn MeshTransport> {
        &self.transport
    }

    /// GET the first reachable candidate.
    pub async fn get(&self, target: &str, candidates: &[Candidate]) -> Result<Value, AggregateError> {
        try_in_order(target, candidates, |candidate| {
            let transport = Arc::clone(&self.transport);
            async move { transport.get_json(&candidate.url).await }
        })
        .await
    }

    /// POST `body` to the first reachable candidate.
    pub async fn post(
        &self,
        target: &str,
        candidates: &[Candidate],
        body: &Value,
    ) -> Result<Value, AggregateError> {
        try_in_order(target, candidates, |candidate| {
            let transport = Arc::clone(&self.transport);
            let body = body.clone();
            async move { transport.post_json(&candidate.url, &body).await }
        })
        .await
    }
}
