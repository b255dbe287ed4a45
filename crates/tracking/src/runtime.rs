//! Per-session distance accumulation state.
//!
//! Entries are process-local. Each session has its own async lock so that at
//! most one collection mutates a session at a time while different sessions
//! proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use telemesh_core::{round_to_cm, GeoPoint};
use tokio::sync::Mutex as AsyncMutex;

use crate::store::Measure;

/// Last fix and running distance for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RuntimeCacheEntry {
    pub last_point: Option<GeoPoint>,
    pub cumulative_distance_m: f64,
}

impl RuntimeCacheEntry {
    /// Rebuild from the most recent persisted measure, if any.
    pub fn hydrate(latest: Option<&Measure>) -> Self {
        match latest {
            Some(m) => Self {
                last_point: Some(GeoPoint::new(m.lat, m.lon)),
                cumulative_distance_m: m.distance_m,
            },
            None => Self::default(),
        }
    }

    /// State after moving to `point`.
    pub fn advance(&self, point: GeoPoint) -> Self {
        let step = self
            .last_point
            .map(|last| last.distance_to(&point))
            .unwrap_or(0.0);
        Self {
            last_point: Some(point),
            cumulative_distance_m: self.cumulative_distance_m + step,
        }
    }

    /// Reported distance, rounded to centimetres.
    pub fn distance_m(&self) -> f64 {
        round_to_cm(self.cumulative_distance_m)
    }
}

/// Slot holding a session's entry; `None` until hydrated.
pub type CacheSlot = Arc<AsyncMutex<Option<RuntimeCacheEntry>>>;

/// Session id to cache slot.
#[derive(Default)]
pub struct RuntimeCache {
    slots: Mutex<HashMap<String, CacheSlot>>,
}

impl RuntimeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `session_id`, created empty on first access.
    pub fn slot(&self, session_id: &str) -> CacheSlot {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        Arc::clone(
            slots
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(None))),
        )
    }

    /// Current entry without waiting; `None` if absent, unhydrated or busy.
    pub fn peek(&self, session_id: &str) -> Option<RuntimeCacheEntry> {
        let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots
            .get(session_id)
            .and_then(|slot| slot.try_lock().ok().and_then(|entry| *entry))
    }

    /// Drop every entry, as after a restart.
    pub fn clear(&self) {
        self.slots
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
