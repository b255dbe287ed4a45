//! Leader role: gathers all three leaves for one collection request.
//!
//! The leader identity rotates lazily. Each inbound request first checks
//! whether the election interval has elapsed and, if so, draws a new leader
//! at random. The identity is informational and does not change which leaves
//! are queried.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use telemesh_core::config::{LeaderConfig, ResolverConfig, TargetConfig};
use telemesh_core::{Clock, LeaderRole, LeaderTag, SharedSecret};
use telemesh_mesh::{try_in_order, AddressResolver, FallbackCaller, MeshError};
use tracing::{debug, info, instrument};

use crate::error::{GatherError, GatherResult, LeafFailure};

/// Rotating leader identity.
pub struct LeaderElection {
    tag: Mutex<LeaderTag>,
    interval: f64,
    clock: Arc<dyn Clock>,
}

impl LeaderElection {
    /// Elect an initial leader now.
    pub fn new(interval: Duration, clock: Arc<dyn Clock>) -> Self {
        let tag = LeaderTag {
            leader_id: draw(),
            elected_at: clock.now(),
        };
        Self {
            tag: Mutex::new(tag),
            interval: interval.as_secs_f64(),
            clock,
        }
    }

    /// Rotate if the interval has elapsed, then return the current tag.
    pub fn observe(&self) -> LeaderTag {
        let now = self.clock.now();
        let mut tag = self.tag.lock().unwrap_or_else(|p| p.into_inner());
        if now - tag.elected_at >= self.interval {
            let previous = tag.leader_id;
            *tag = LeaderTag {
                leader_id: draw(),
                elected_at: now,
            };
            info!(
                previous = previous.as_str(),
                leader = tag.leader_id.as_str(),
                "leader rotated"
            );
        }
        *tag
    }

    /// Current tag without rotating.
    pub fn current(&self) -> LeaderTag {
        *self.tag.lock().unwrap_or_else(|p| p.into_inner())
    }
}

fn draw() -> LeaderRole {
    LeaderRole::ALL
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(LeaderRole::Gps)
}

/// Combined leaf payloads returned to the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatherResponse {
    /// Leader at the time of the request
    pub leader_id: LeaderRole,
    /// When that leader was elected
    pub leader_elected_at: f64,
    /// Raw GPS payload, key removed
    pub gps: Value,
    /// Raw battery payload, key removed
    pub battery: Value,
    /// Raw temperature payload, key removed
    pub temperature: Value,
}

/// Fans a collection request out to the three leaves.
pub struct GatherCoordinator {
    secret: SharedSecret,
    election: LeaderElection,
    resolver: AddressResolver,
    caller: FallbackCaller,
    gps: TargetConfig,
    battery: TargetConfig,
    temperature: TargetConfig,
}

impl GatherCoordinator {
    pub fn new(
        secret: SharedSecret,
        config: &LeaderConfig,
        policy: ResolverConfig,
        caller: FallbackCaller,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            secret,
            election: LeaderElection::new(config.election_interval(), clock),
            resolver: AddressResolver::new(policy, config.timeouts),
            caller,
            gps: config.gps.clone(),
            battery: config.battery.clone(),
            temperature: config.temperature.clone(),
        }
    }

    /// Leader identity state.
    pub fn election(&self) -> &LeaderElection {
        &self.election
    }

    /// Handle one inbound collection request.
    ///
    /// Rotation happens before the key check, so an unauthenticated request
    /// still advances the election clock but never reaches a leaf.
    #[instrument(skip_all)]
    pub async fn gather(&self, presented_key: Option<&str>) -> GatherResult<GatherResponse> {
        let tag = self.election.observe();

        self.secret
            .authenticate(presented_key)
            .map_err(|_| GatherError::Authentication)?;

        let (gps, battery, temperature) = tokio::join!(
            self.fetch_leaf("gps", &self.gps),
            self.fetch_leaf("battery", &self.battery),
            self.fetch_leaf("temperature", &self.temperature),
        );

        match (gps, battery, temperature) {
            (Ok(gps), Ok(battery), Ok(temperature)) => {
                debug!(leader = tag.leader_id.as_str(), "gather complete");
                Ok(GatherResponse {
                    leader_id: tag.leader_id,
                    leader_elected_at: tag.elected_at,
                    gps,
                    battery,
                    temperature,
                })
            }
            (gps, battery, temperature) => Err(GatherError::Leaves(
                [gps.err(), battery.err(), temperature.err()]
                    .into_iter()
                    .flatten()
                    .collect(),
            )),
        }
    }

    async fn fetch_leaf(&self, leaf: &str, target: &TargetConfig) -> Result<Value, LeafFailure> {
        let candidates = self
            .resolver
            .resolve(leaf, target)
            .await
            .map_err(|e| LeafFailure::Config {
                leaf: leaf.to_string(),
                message: e.to_string(),
            })?;

        try_in_order(leaf, &candidates, |candidate| {
            let transport = Arc::clone(self.caller.transport());
            let secret = self.secret.clone();
            async move {
                let payload = transport.get_json(&candidate.url).await?;
                verify_echo(payload, &secret)
            }
        })
        .await
        .map_err(LeafFailure::Unreachable)
    }
}

/// Check the echoed key and strip it from the payload.
fn verify_echo(payload: Value, secret: &SharedSecret) -> Result<Value, MeshError> {
    let Value::Object(mut fields) = payload else {
        return Err(MeshError::Rejected("payload is not an object".to_string()));
    };
    match fields.remove("key") {
        Some(Value::String(key)) if secret.matches(&key) => Ok(Value::Object(fields)),
        _ => Err(MeshError::Rejected("leaf key mismatch".to_string())),
    }
}
