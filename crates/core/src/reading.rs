//! Sensor payloads as they travel leaf → leader → router → backend.
//!
//! Leaf payloads keep the field names the sensors emit (`lat`, `batterie`,
//! `humidite`, ...). The router flattens them into [`CanonicalReading`], where
//! every field is optional so that reshaping never fails. Only the validator
//! turns a canonical reading into a [`Reading`].

use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// Identity a leader can be elected as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderRole {
    /// GPS leaf
    Gps,
    /// Temperature leaf
    Temperature,
    /// Battery leaf
    Batterie,
}

impl LeaderRole {
    /// Election candidate set.
    pub const ALL: [LeaderRole; 3] = [LeaderRole::Gps, LeaderRole::Temperature, LeaderRole::Batterie];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaderRole::Gps => "gps",
            LeaderRole::Temperature => "temperature",
            LeaderRole::Batterie => "batterie",
        }
    }
}

/// Current leader identity. Informational only; it does not change which
/// leaves are queried.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeaderTag {
    /// Elected identity
    pub leader_id: LeaderRole,
    /// Unix seconds of the election
    pub elected_at: f64,
}

/// Payload served by the GPS leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsPayload {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Unix seconds
    pub timestamp: f64,
    /// Echo of the shared key
    pub key: String,
}

/// Payload served by the battery leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryPayload {
    /// Charge in percent
    pub batterie: f64,
    /// Unix seconds
    pub timestamp: f64,
    /// Echo of the shared key
    pub key: String,
}

/// Payload served by the temperature leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperaturePayload {
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity in percent
    pub humidite: f64,
    /// Pressure in hPa
    pub pression: f64,
    /// Unix seconds
    pub timestamp: f64,
    /// Echo of the shared key
    pub key: String,
}

/// Flat reading produced by the router. Any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalReading {
    /// Latitude in degrees
    pub latitude: Option<f64>,
    /// Longitude in degrees
    pub longitude: Option<f64>,
    /// Degrees Celsius
    pub temperature: Option<f64>,
    /// Relative humidity in percent
    pub humidity: Option<f64>,
    /// Pressure in hPa
    pub pressure: Option<f64>,
    /// Battery charge in percent
    pub battery_pct: Option<f64>,
    /// Unix seconds
    pub timestamp: Option<f64>,
    /// Leader identity at gather time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader_id: Option<String>,
}

/// A complete, range-checked reading. Only [`crate::validation::validate`]
/// constructs one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    latitude: f64,
    longitude: f64,
    temperature: f64,
    humidity: f64,
    pressure: f64,
    battery_pct: f64,
    timestamp: f64,
}

impl Reading {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        latitude: f64,
        longitude: f64,
        temperature: f64,
        humidity: f64,
        pressure: f64,
        battery_pct: f64,
        timestamp: f64,
    ) -> Self {
        Self {
            latitude,
            longitude,
            temperature,
            humidity,
            pressure,
            battery_pct,
            timestamp,
        }
    }

    /// Latitude in degrees
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Degrees Celsius
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Relative humidity in percent
    pub fn humidity(&self) -> f64 {
        self.humidity
    }

    /// Pressure in hPa
    pub fn pressure(&self) -> f64 {
        self.pressure
    }

    /// Battery charge in percent
    pub fn battery_pct(&self) -> f64 {
        self.battery_pct
    }

    /// Unix seconds reported by the leaves
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// GPS fix
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Back to the wire shape.
    pub fn to_canonical(&self) -> CanonicalReading {
        CanonicalReading {
            latitude: Some(self.latitude),
            longitude: Some(self.longitude),
            temperature: Some(self.temperature),
            humidity: Some(self.humidity),
            pressure: Some(self.pressure),
            battery_pct: Some(self.battery_pct),
            timestamp: Some(self.timestamp),
            leader_id: None,
        }
    }
}
