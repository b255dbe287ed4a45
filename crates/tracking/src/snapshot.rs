//! Process-wide "latest reading" snapshot.
//!
//! Written by the collection path and the event-stream subscriber, read by the
//! unauthenticated `/api/latest` endpoint. Readers get an immutable `Arc`.

use std::sync::{Arc, RwLock};

use serde::Serialize;
use telemesh_core::CanonicalReading;

/// Freshest accepted reading from either ingestion path.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatestReading {
    #[serde(flatten)]
    pub reading: CanonicalReading,
    pub distance_m: Option<f64>,
    pub session_id: Option<String>,
    /// Wall-clock Unix seconds when the snapshot was replaced
    pub ts: Option<f64>,
}

#[derive(Debug, Default)]
pub struct LatestSnapshot {
    current: RwLock<Arc<LatestReading>>,
}

impl LatestSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Arc<LatestReading> {
        Arc::clone(&self.current.read().unwrap_or_else(|p| p.into_inner()))
    }

    pub fn replace(&self, latest: LatestReading) {
        *self.current.write().unwrap_or_else(|p| p.into_inner()) = Arc::new(latest);
    }
}
