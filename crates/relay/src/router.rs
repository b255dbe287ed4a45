//! Router role: authenticates collection requests, calls the leader and
//! flattens its nested answer into the canonical reading.

use std::sync::Arc;

use serde_json::{json, Value};
use telemesh_core::config::{ResolverConfig, RouterConfig, TargetConfig};
use telemesh_core::{CanonicalReading, Clock, SharedSecret};
use telemesh_mesh::{AddressResolver, FallbackCaller, MeshError, Publisher};
use tracing::{debug, instrument, warn};

use crate::error::{RouteError, RouteResult};

/// Optional republish of every canonical reading.
pub struct Republish {
    publisher: Arc<dyn Publisher>,
    topic: String,
}

impl Republish {
    /// Republish through `publisher` on `topic`.
    pub fn new(publisher: Arc<dyn Publisher>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
        }
    }
}

/// Authenticating front of the mesh.
///
/// Checks the caller's key, resolves the leader, POSTs the key on with
/// candidate fallback and flattens the leader's nested answer. A leader that
/// reports a configuration failure is surfaced as
/// [`RouteError::Configuration`] so callers do not retry it.
pub struct RouteAggregator {
    secret: SharedSecret,
    resolver: AddressResolver,
    caller: FallbackCaller,
    leader: TargetConfig,
    clock: Arc<dyn Clock>,
    republish: Option<Republish>,
}

impl RouteAggregator {
    /// Build a router for `config.leader` under the given address policy.
    pub fn new(
        secret: SharedSecret,
        config: &RouterConfig,
        policy: ResolverConfig,
        caller: FallbackCaller,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            secret,
            resolver: AddressResolver::new(policy, config.timeouts),
            caller,
            leader: config.leader.clone(),
            clock,
            republish: None,
        }
    }

    /// Publish each successful reading on `republish.topic`.
    pub fn with_republish(mut self, republish: Republish) -> Self {
        self.republish = Some(republish);
        self
    }

    /// Authenticate, call the leader and reshape its answer.
    #[instrument(skip_all)]
    pub async fn collect(&self, presented_key: Option<&str>) -> RouteResult<CanonicalReading> {
        self.secret
            .authenticate(presented_key)
            .map_err(|_| RouteError::Authentication)?;

        let candidates = self
            .resolver
            .resolve("leader", &self.leader)
            .await
            .map_err(|e| match e {
                MeshError::Config(msg) => RouteError::Configuration(msg),
                other => RouteError::Configuration(other.to_string()),
            })?;

        let body = json!({ "key": self.secret.expose() });
        let payload = self
            .caller
            .post("leader", &candidates, &body)
            .await
            .map_err(|agg| {
                if agg.is_configuration() {
                    RouteError::Configuration(agg.to_string())
                } else {
                    RouteError::LeaderUnreachable(agg)
                }
            })?;

        let reading = reshape(&payload, self.clock.now());
        debug!(leader = ?reading.leader_id, "reading reshaped");

        if let Some(republish) = &self.republish {
            match serde_json::to_value(&reading) {
                Ok(value) => {
                    if let Err(e) = republish.publisher.publish(&republish.topic, &value).await {
                        warn!(topic = %republish.topic, error = %e, "republish failed");
                    }
                }
                Err(e) => warn!(error = %e, "reading not serializable"),
            }
        }

        Ok(reading)
    }
}

/// Flatten the leader's nested payload.
///
/// Missing or mistyped fields become `None`; nothing here fails. The timestamp
/// is the newest leaf timestamp, or `fallback_ts` when no leaf reported one.
pub fn reshape(payload: &Value, fallback_ts: f64) -> CanonicalReading {
    let gps = &payload["gps"];
    let battery = &payload["battery"];
    let temperature = &payload["temperature"];

    let timestamp = [gps, battery, temperature]
        .iter()
        .filter_map(|leaf| leaf["timestamp"].as_f64())
        .fold(None, |newest: Option<f64>, ts| Some(newest.map_or(ts, |n| n.max(ts))))
        .unwrap_or(fallback_ts);

    CanonicalReading {
        latitude: gps["lat"].as_f64(),
        longitude: gps["lon"].as_f64(),
        temperature: temperature["temperature"].as_f64(),
        humidity: temperature["humidite"].as_f64(),
        pressure: temperature["pression"].as_f64(),
        battery_pct: battery["batterie"].as_f64(),
        timestamp: Some(timestamp),
        leader_id: payload["leader_id"].as_str().map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use telemesh_core::config::HopTimeouts;
    use telemesh_core::{ErrorCategory, ManualClock};
    use telemesh_mesh::{MeshResult, MeshTransport, RecordingPublisher};

    struct LeaderStub {
        reply: MeshResult<Value>,
        bodies: Mutex<Vec<Value>>,
    }

    impl LeaderStub {
        fn answering(reply: MeshResult<Value>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                bodies: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MeshTransport for LeaderStub {
        async fn get_json(&self, _url: &str) -> MeshResult<Value> {
            Err(MeshError::Rejected("leader only accepts POST".to_string()))
        }

        async fn post_json(&self, _url: &str, body: &Value) -> MeshResult<Value> {
            self.bodies.lock().unwrap().push(body.clone());
            match &self.reply {
                Ok(v) => Ok(v.clone()),
                Err(MeshError::Unauthorized) => Err(MeshError::Unauthorized),
                Err(MeshError::Status {
                    status,
                    message,
                    category,
                }) => Err(MeshError::Status {
                    status: *status,
                    message: message.clone(),
                    category: *category,
                }),
                Err(_) => Err(MeshError::Timeout(Duration::from_secs(4))),
            }
        }
    }

    fn leader_payload() -> Value {
        json!({
            "leader_id": "temperature",
            "leader_elected_at": 5.0,
            "gps": {"lat": 48.8566, "lon": 2.3522, "timestamp": 100.0},
            "battery": {"batterie": 90.0, "timestamp": 102.0},
            "temperature": {"temperature": 20.0, "humidite": 50.0, "pression": 1013.0, "timestamp": 101.0}
        })
    }

    fn router(transport: Arc<LeaderStub>) -> RouteAggregator {
        let mut config = RouterConfig::default();
        config.leader.host = "127.0.0.1".to_string();
        config.timeouts = HopTimeouts {
            mesh_secs: 0.05,
            hostname_secs: 0.1,
        };
        RouteAggregator::new(
            SharedSecret::new("zolis-key"),
            &config,
            ResolverConfig {
                use_mesh_address: false,
                strict: false,
            },
            FallbackCaller::new(transport),
            Arc::new(ManualClock::starting_at(999.0)),
        )
    }

    #[test]
    fn test_reshape_flattens_leaves() {
        let reading = reshape(&leader_payload(), 0.0);
        assert_eq!(reading.latitude, Some(48.8566));
        assert_eq!(reading.longitude, Some(2.3522));
        assert_eq!(reading.temperature, Some(20.0));
        assert_eq!(reading.humidity, Some(50.0));
        assert_eq!(reading.pressure, Some(1013.0));
        assert_eq!(reading.battery_pct, Some(90.0));
        assert_eq!(reading.timestamp, Some(102.0));
        assert_eq!(reading.leader_id.as_deref(), Some("temperature"));
    }

    #[test]
    fn test_reshape_never_fails_on_missing_fields() {
        let reading = reshape(&json!({"gps": {"lat": "north"}, "battery": null}), 42.0);
        assert_eq!(reading.latitude, None);
        assert_eq!(reading.longitude, None);
        assert_eq!(reading.battery_pct, None);
        assert_eq!(reading.timestamp, Some(42.0));
        assert_eq!(reading.leader_id, None);

        let reading = reshape(&json!("garbage"), 7.0);
        assert_eq!(reading.temperature, None);
        assert_eq!(reading.timestamp, Some(7.0));
    }

    #[tokio::test]
    async fn test_collect_sends_key_and_publishes() {
        let transport = LeaderStub::answering(Ok(leader_payload()));
        let publisher = Arc::new(RecordingPublisher::new());
        let router = router(transport.clone())
            .with_republish(Republish::new(publisher.clone(), "telemesh/readings"));

        let reading = router.collect(Some("zolis-key")).await.unwrap();
        assert_eq!(reading.battery_pct, Some(90.0));
        assert_eq!(transport.bodies.lock().unwrap()[0], json!({"key": "zolis-key"}));

        let published = publisher.on_topic("telemesh/readings");
        assert_eq!(published.len(), 1);
        assert_eq!(published[0]["battery_pct"], json!(90.0));
    }

    #[tokio::test]
    async fn test_bad_key_never_reaches_leader() {
        let transport = LeaderStub::answering(Ok(leader_payload()));
        let router = router(transport.clone());

        let err = router.collect(Some("nope")).await.unwrap_err();
        assert!(matches!(err, RouteError::Authentication));
        assert!(transport.bodies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_leader_down_is_aggregate_and_not_published() {
        let transport = LeaderStub::answering(Err(MeshError::Timeout(Duration::from_secs(4))));
        let publisher = Arc::new(RecordingPublisher::new());
        let router = router(transport)
            .with_republish(Republish::new(publisher.clone(), "telemesh/readings"));

        match router.collect(Some("zolis-key")).await.unwrap_err() {
            RouteError::LeaderUnreachable(agg) => {
                assert_eq!(agg.target, "leader");
                assert_eq!(agg.attempts.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(publisher.messages().is_empty());
    }

    #[tokio::test]
    async fn test_leader_configuration_error_stays_configuration() {
        let transport = LeaderStub::answering(Err(MeshError::Status {
            status: 500,
            message: "configuration error: no mesh address for gps".to_string(),
            category: Some(ErrorCategory::Configuration),
        }));
        let router = router(transport.clone());

        let err = router.collect(Some("zolis-key")).await.unwrap_err();
        match &err {
            RouteError::Configuration(msg) => assert!(msg.contains("no mesh address for gps")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(!err.category().is_retryable());
        assert_eq!(transport.bodies.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_leader_transport_status_stays_unreachable() {
        let transport = LeaderStub::answering(Err(MeshError::Status {
            status: 503,
            message: "gps unreachable".to_string(),
            category: Some(ErrorCategory::Transport),
        }));

        let err = router(transport).collect(Some("zolis-key")).await.unwrap_err();
        assert!(matches!(err, RouteError::LeaderUnreachable(_)));
        assert_eq!(err.category(), ErrorCategory::Transport);
    }

    #[tokio::test]
    async fn test_strict_mode_without_leader_file() {
        let mut config = RouterConfig::default();
        config.leader.addr_file = None;
        let router = RouteAggregator::new(
            SharedSecret::new("zolis-key"),
            &config,
            ResolverConfig {
                use_mesh_address: true,
                strict: true,
            },
            FallbackCaller::new(LeaderStub::answering(Ok(leader_payload()))),
            Arc::new(ManualClock::starting_at(0.0)),
        );

        let err = router.collect(Some("zolis-key")).await.unwrap_err();
        assert!(matches!(err, RouteError::Configuration(_)));
    }
}
