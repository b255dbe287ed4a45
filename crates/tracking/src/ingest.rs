//! Sessionless ingestion from the router's event stream.
//!
//! Messages are folded into one global accumulator and the latest snapshot.
//! Nothing here is persisted.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use telemesh_core::{validate, CanonicalReading, Clock};
use tracing::debug;

use crate::error::{TrackingError, TrackingResult};
use crate::runtime::RuntimeCacheEntry;
use crate::snapshot::{LatestReading, LatestSnapshot};

pub struct StreamIngest {
    accumulator: Mutex<RuntimeCacheEntry>,
    snapshot: Arc<LatestSnapshot>,
    clock: Arc<dyn Clock>,
}

impl StreamIngest {
    pub fn new(snapshot: Arc<LatestSnapshot>, clock: Arc<dyn Clock>) -> Self {
        Self {
            accumulator: Mutex::new(RuntimeCacheEntry::default()),
            snapshot,
            clock,
        }
    }

    /// Decode, validate and fold one message.
    pub fn ingest(&self, payload: Value) -> TrackingResult<LatestReading> {
        let canonical: CanonicalReading = serde_json::from_value(payload)
            .map_err(|e| TrackingError::Malformed(e.to_string()))?;
        let reading = validate(&canonical)?;

        let distance_m = {
            let mut acc = self.accumulator.lock().unwrap_or_else(|p| p.into_inner());
            *acc = acc.advance(reading.point());
            acc.distance_m()
        };

        let mut reading_out = reading.to_canonical();
        reading_out.leader_id = canonical.leader_id;
        let latest = LatestReading {
            reading: reading_out,
            distance_m: Some(distance_m),
            session_id: None,
            ts: Some(self.clock.now()),
        };
        self.snapshot.replace(latest.clone());
        Ok(latest)
    }

    /// Subscriber callback: ingest and drop failures.
    pub fn handle(&self, topic: &str, payload: Value) {
        if let Err(e) = self.ingest(payload) {
            debug!(topic, error = %e, "dropping stream message");
        }
    }

    /// Global running distance.
    pub fn total_distance_m(&self) -> f64 {
        self.accumulator
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .distance_m()
    }
}
