//! Telemesh relay roles.
//!
//! The simulated leaves, the leader that gathers them and the router that
//! fronts the leader for the tracking backend. Each role is transport-agnostic
//! here; `mesh-node` serves them over HTTP.

pub mod error;
pub mod leader;
pub mod router;
pub mod sensors;

pub use error::{GatherError, GatherResult, LeafFailure, RouteError, RouteResult};
pub use leader::{GatherCoordinator, GatherResponse, LeaderElection};
pub use router::{reshape, Republish, RouteAggregator};
pub use sensors::{BatterySensor, GpsSensor, Sensor, TemperatureSensor};
