//! Backend side of the backend → router hop.

use async_trait::async_trait;
use serde_json::json;
use telemesh_core::config::{HopTimeouts, ResolverConfig, TargetConfig};
use telemesh_core::{CanonicalReading, SharedSecret};
use telemesh_mesh::{AddressResolver, FallbackCaller};

use crate::error::RouterCallError;

/// Source of canonical readings.
#[async_trait]
pub trait RouterClient: Send + Sync {
    /// One end-to-end collection through the router.
    async fn collect(&self) -> Result<CanonicalReading, RouterCallError>;
}

/// Router reached over the mesh with candidate fallback.
pub struct HttpRouterClient {
    secret: SharedSecret,
    resolver: AddressResolver,
    caller: FallbackCaller,
    router: TargetConfig,
}

impl HttpRouterClient {
    /// Client for the router at `router`, resolved under `policy`.
    pub fn new(
        secret: SharedSecret,
        router: TargetConfig,
        policy: ResolverConfig,
        timeouts: HopTimeouts,
        caller: FallbackCaller,
    ) -> Self {
        Self {
            secret,
            resolver: AddressResolver::new(policy, timeouts),
            caller,
            router,
        }
    }
}

#[async_trait]
impl RouterClient for HttpRouterClient {
    async fn collect(&self) -> Result<CanonicalReading, RouterCallError> {
        let candidates = self
            .resolver
            .resolve("router", &self.router)
            .await
            .map_err(|e| RouterCallError::Configuration(e.to_string()))?;

        let body = json!({ "key": self.secret.expose() });
        let value = self
            .caller
            .post("router", &candidates, &body)
            .await
            .map_err(|agg| {
                if agg.is_configuration() {
                    RouterCallError::Configuration(agg.to_string())
                } else if agg.is_unauthorized() {
                    RouterCallError::Unauthorized(agg)
                } else {
                    RouterCallError::Unreachable(agg)
                }
            })?;

        serde_json::from_value(value).map_err(|e| RouterCallError::Decode(e.to_string()))
    }
}
