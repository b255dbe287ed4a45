//! Session-scoped collection.
//!
//! A collection resolves the target session, fetches a reading through the
//! router with bounded retries, validates it, advances the session's distance
//! under the session lock, persists, publishes and refreshes the latest
//! snapshot. The runtime entry only moves forward once the measure is stored.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use telemesh_core::config::BackendConfig;
use telemesh_core::{validate, CanonicalReading, Clock, Reading};
use telemesh_mesh::Publisher;
use tracing::{debug, info, instrument, warn};

use crate::error::{TrackingError, TrackingResult};
use crate::router_client::RouterClient;
use crate::runtime::{RuntimeCache, RuntimeCacheEntry};
use crate::snapshot::{LatestReading, LatestSnapshot};
use crate::store::{Measure, Session, Store};

/// Outer retry budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectPolicy {
    /// Total router calls per collection, at least one
    pub attempts: u32,
    /// Pause between failed attempts
    pub delay: Duration,
    /// Budget for each router call
    pub attempt_timeout: Duration,
}

impl CollectPolicy {
    /// Budget from the backend section; `collect_retries` of zero still
    /// makes one call.
    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            attempts: config.collect_retries.max(1),
            delay: config.collect_delay(),
            attempt_timeout: config.collect_timeout(),
        }
    }
}

/// A persisted collection result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReading {
    /// Validated reading as sent back to the caller
    #[serde(flatten)]
    pub reading: CanonicalReading,
    /// Session total after this reading, metres
    pub distance_m: f64,
    pub session_id: String,
    /// Row id of the stored measure
    pub measure_id: i64,
}

/// Result of a collection that may or may not be bound to a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Collected {
    /// Persisted against a session
    Session(SessionReading),
    /// Validated only; no session was available
    Unbound(CanonicalReading),
}

/// Drives collections for the tracking backend.
///
/// Holds the current-session pointer and the per-session runtime cache.
/// Distance for a session only advances while that session's slot is locked,
/// so concurrent collections into one session are applied one at a time.
pub struct SessionCollectionOrchestrator {
    router: Arc<dyn RouterClient>,
    store: Arc<dyn Store>,
    publisher: Option<Arc<dyn Publisher>>,
    snapshot: Arc<LatestSnapshot>,
    clock: Arc<dyn Clock>,
    policy: CollectPolicy,
    cache: RuntimeCache,
    current: RwLock<Option<String>>,
}

impl SessionCollectionOrchestrator {
    /// Orchestrator with an empty cache, no current session and no publisher.
    pub fn new(
        router: Arc<dyn RouterClient>,
        store: Arc<dyn Store>,
        snapshot: Arc<LatestSnapshot>,
        clock: Arc<dyn Clock>,
        policy: CollectPolicy,
    ) -> Self {
        Self {
            router,
            store,
            publisher: None,
            snapshot,
            clock,
            policy,
            cache: RuntimeCache::new(),
            current: RwLock::new(None),
        }
    }

    /// Publish per-topic breakdowns after each persisted reading.
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Per-session running positions and totals.
    pub fn cache(&self) -> &RuntimeCache {
        &self.cache
    }

    /// Most recent reading seen by this process, from any source.
    pub fn latest(&self) -> Arc<LatestReading> {
        self.snapshot.get()
    }

    /// Session used when a request names none.
    pub fn current_session(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn set_current(&self, session_id: &str) {
        *self.current.write().unwrap_or_else(|p| p.into_inner()) = Some(session_id.to_string());
    }

    /// Create a session for `owner_id` and make it current.
    pub fn create_session(&self, owner_id: &str) -> TrackingResult<Session> {
        let session = self.store.create_session(owner_id, self.clock.now())?;
        self.set_current(&session.id);
        info!(session = %session.id, owner = owner_id, "session started");
        Ok(session)
    }

    /// Make an existing session current.
    pub fn select_session(&self, session_id: &str) -> TrackingResult<Session> {
        let session = self.session(session_id)?;
        self.set_current(&session.id);
        Ok(session)
    }

    /// Stored session, or `NotFound`.
    pub fn session(&self, session_id: &str) -> TrackingResult<Session> {
        self.store
            .get_session(session_id)?
            .ok_or_else(|| TrackingError::NotFound(session_id.to_string()))
    }

    /// Sessions of `owner_id`, newest first.
    pub fn owner_sessions(&self, owner_id: &str, limit: usize) -> TrackingResult<Vec<Session>> {
        Ok(self.store.list_sessions(owner_id, limit)?)
    }

    /// Up to `limit` measures of an existing session in record order.
    pub fn measures(&self, session_id: &str, limit: usize) -> TrackingResult<Vec<Measure>> {
        self.session(session_id)?;
        Ok(self.store.list_measures(session_id, limit)?)
    }

    /// Last recorded measure of an existing session, if any.
    pub fn session_latest(&self, session_id: &str) -> TrackingResult<Option<Measure>> {
        self.session(session_id)?;
        Ok(self.store.latest_measure(session_id)?)
    }

    fn resolve_session(&self, session_id: Option<&str>) -> TrackingResult<String> {
        session_id
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| self.current_session())
            .ok_or(TrackingError::NoSession)
    }

    /// Collect into the given session, or the current one.
    #[instrument(skip(self))]
    pub async fn collect(&self, session_id: Option<&str>) -> TrackingResult<SessionReading> {
        let session_id = self.resolve_session(session_id)?;
        self.session(&session_id)?;

        let (reading, leader_id) = self.fetch_valid().await?;

        let slot = self.cache.slot(&session_id);
        let mut entry = slot.lock().await;
        let current = match *entry {
            Some(current) => current,
            None => {
                let hydrated =
                    RuntimeCacheEntry::hydrate(self.store.latest_measure(&session_id)?.as_ref());
                *entry = Some(hydrated);
                hydrated
            }
        };
        let next = current.advance(reading.point());
        let measure = self.store.record_measure(
            &session_id,
            &reading,
            next.distance_m(),
            self.clock.now(),
        )?;
        *entry = Some(next);
        drop(entry);

        let mut canonical = reading.to_canonical();
        canonical.leader_id = leader_id;
        let result = SessionReading {
            reading: canonical,
            distance_m: measure.distance_m,
            session_id: session_id.clone(),
            measure_id: measure.id,
        };
        debug!(session = %session_id, distance_m = result.distance_m, "reading accepted");

        let now = self.clock.now();
        self.publish_topics(&result, now).await;
        self.snapshot.replace(LatestReading {
            reading: result.reading.clone(),
            distance_m: Some(result.distance_m),
            session_id: Some(session_id),
            ts: Some(now),
        });

        Ok(result)
    }

    /// Fetch and validate without touching any session state.
    pub async fn collect_unbound(&self) -> TrackingResult<CanonicalReading> {
        let (reading, leader_id) = self.fetch_valid().await?;
        let mut canonical = reading.to_canonical();
        canonical.leader_id = leader_id;
        Ok(canonical)
    }

    /// Session collection when a session is known, unbound collection otherwise.
    pub async fn collect_any(&self, session_id: Option<&str>) -> TrackingResult<Collected> {
        match self.collect(session_id).await {
            Ok(reading) => Ok(Collected::Session(reading)),
            Err(TrackingError::NoSession) => self.collect_unbound().await.map(Collected::Unbound),
            Err(e) => Err(e),
        }
    }

    async fn fetch_valid(&self) -> TrackingResult<(Reading, Option<String>)> {
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=self.policy.attempts {
            match tokio::time::timeout(self.policy.attempt_timeout, self.router.collect()).await {
                Ok(Ok(canonical)) => {
                    let reading = validate(&canonical)?;
                    return Ok((reading, canonical.leader_id));
                }
                Ok(Err(e)) if !e.is_retryable() => return Err(e.into()),
                Ok(Err(e)) => {
                    warn!(attempt, error = %e, "collection attempt failed");
                    last_error = e.to_string();
                }
                Err(_) => {
                    warn!(attempt, timeout = ?self.policy.attempt_timeout, "collection attempt timed out");
                    last_error = format!("timed out after {:?}", self.policy.attempt_timeout);
                }
            }
            if attempt < self.policy.attempts {
                tokio::time::sleep(self.policy.delay).await;
            }
        }

        Err(TrackingError::Unavailable(last_error))
    }

    async fn publish_topics(&self, result: &SessionReading, now: f64) {
        let Some(publisher) = &self.publisher else {
            return;
        };
        for (topic, payload) in topic_payloads(result, now) {
            if let Err(e) = publisher.publish(&topic, &payload).await {
                warn!(topic = %topic, error = %e, "publish failed");
            }
        }
    }
}

/// The four per-session breakdowns, in publish order.
pub fn topic_payloads(result: &SessionReading, now: f64) -> Vec<(String, Value)> {
    let sid = &result.session_id;
    let r = &result.reading;
    let mut latest = serde_json::to_value(result).unwrap_or_else(|_| json!({}));
    if let Value::Object(fields) = &mut latest {
        fields.insert("ts".to_string(), json!(now));
    }
    vec![
        (
            format!("tracking/{}/gps", sid),
            json!({ "session_id": sid, "lat": r.latitude, "lon": r.longitude, "timestamp": now }),
        ),
        (
            format!("tracking/{}/temperature", sid),
            json!({
                "session_id": sid,
                "temperature": r.temperature,
                "humidity": r.humidity,
                "pressure": r.pressure,
                "timestamp": now,
            }),
        ),
        (
            format!("tracking/{}/battery", sid),
            json!({ "session_id": sid, "battery_pct": r.battery_pct, "timestamp": now }),
        ),
        (format!("tracking/{}/latest", sid), latest),
    ]
}
