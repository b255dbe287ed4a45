//! Telemesh Mesh - hop-to-hop plumbing for the sensor mesh
//!
//! Every hop (leader → leaves, router → leader, backend → router) reaches its
//! peer the same way: resolve an ordered list of candidate addresses, then try
//! them one after another, each under its own timeout.
//!
//! # Core Components
//!
//! - **Address resolution**: mesh address from a side-channel file, then the
//!   conventional hostname
//! - **Fallback calls**: strictly ordered attempts with per-candidate
//!   timeouts and an aggregated error listing every failure
//! - **Transport**: JSON over HTTP
//! - **Pub/sub**: MQTT publisher and subscriber
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use telemesh_core::MeshConfig;
//! use telemesh_mesh::{AddressResolver, FallbackCaller, HttpTransport};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MeshConfig::default();
//! let resolver = AddressResolver::new(config.resolver.clone(), config.leader.timeouts);
//! let caller = FallbackCaller::new(Arc::new(HttpTransport::new()?));
//!
//! let candidates = resolver.resolve("gps", &config.leader.gps).await?;
//! let payload = caller.get("gps", &candidates).await?;
//! println!("{}", payload);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod fallback;
pub mod pubsub;
pub mod resolver;
pub mod transport;

pub use error::{AggregateError, AttemptFailure, FailureKind, MeshError, MeshResult};
pub use fallback::{try_in_order, FallbackCaller};
pub use pubsub::{MqttPublisher, MqttSubscriber, PublishError, Publisher, RecordingPublisher};
pub use resolver::{AddressResolver, Candidate, CandidateTier};
pub use transport::{HttpTransport, MeshTransport};
