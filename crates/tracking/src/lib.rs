//! Telemesh tracking backend core.
//!
//! Sessions, measure persistence, per-session distance accumulation and the
//! collection orchestrator that drives the backend → router hop. The HTTP
//! surface lives in the `tracking-backend` service.

pub mod error;
pub mod ingest;
pub mod orchestrator;
pub mod router_client;
pub mod runtime;
pub mod snapshot;
pub mod store;

pub use error::{RouterCallError, StoreError, StoreResult, TrackingError, TrackingResult};
pub use ingest::StreamIngest;
pub use orchestrator::{
    topic_payloads, CollectPolicy, Collected, SessionCollectionOrchestrator, SessionReading,
};
pub use router_client::{HttpRouterClient, RouterClient};
pub use runtime::{RuntimeCache, RuntimeCacheEntry};
pub use snapshot::{LatestReading, LatestSnapshot};
pub use store::{Measure, Session, SqliteStore, Store};
