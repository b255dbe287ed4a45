//! Core functionality for the telemesh sensor-collection pipeline.
//!
//! This crate provides the value types, validation rules, geodesy and
//! configuration shared by every hop of the mesh: leaf sensors, the leader,
//! the router and the tracking backend.

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod geo;
pub mod logging;
pub mod reading;
pub mod validation;

pub use auth::SharedSecret;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, MeshConfig};
pub use error::{CoreError, ErrorBody, ErrorCategory};
pub use geo::{haversine_m, round_to_cm, GeoPoint, EARTH_RADIUS_M};
pub use reading::{
    BatteryPayload, CanonicalReading, GpsPayload, LeaderRole, LeaderTag, Reading,
    TemperaturePayload,
};
pub use validation::{validate, ValidationError};
