//! Simulated leaf sensors.
//!
//! Each leaf keeps a small amount of state between reads and answers with its
//! metrics, a Unix timestamp and the shared key echoed back.

use std::sync::{Arc, Mutex};

use rand::Rng;
use serde_json::Value;
use telemesh_core::{
    BatteryPayload, Clock, GpsPayload, SharedSecret, TemperaturePayload,
};

/// A leaf that can be read over the mesh.
pub trait Sensor: Send + Sync {
    /// Resource path the leaf is served under.
    fn resource(&self) -> &'static str;

    /// Take one reading.
    fn read_json(&self) -> Value;
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// GPS leaf moving on a fixed heading.
pub struct GpsSensor {
    position: Mutex<(f64, f64)>,
    secret: SharedSecret,
    clock: Arc<dyn Clock>,
}

impl GpsSensor {
    /// Start position.
    pub const ORIGIN: (f64, f64) = (48.8566, 2.3522);
    /// Movement per read in degrees (lat, lon).
    pub const STEP: (f64, f64) = (0.0004, 0.0003);

    pub fn new(secret: SharedSecret, clock: Arc<dyn Clock>) -> Self {
        Self {
            position: Mutex::new(Self::ORIGIN),
            secret,
            clock,
        }
    }

    /// Current position, then advance.
    pub fn read(&self) -> GpsPayload {
        let mut pos = self.position.lock().unwrap_or_else(|p| p.into_inner());
        let (lat, lon) = *pos;
        pos.0 += Self::STEP.0;
        pos.1 += Self::STEP.1;
        GpsPayload {
            lat,
            lon,
            timestamp: self.clock.now(),
            key: self.secret.expose().to_string(),
        }
    }
}

impl Sensor for GpsSensor {
    fn resource(&self) -> &'static str {
        "gps"
    }

    fn read_json(&self) -> Value {
        serde_json::to_value(self.read()).unwrap_or(Value::Null)
    }
}

/// Battery leaf draining at a constant rate.
pub struct BatterySensor {
    level: Mutex<f64>,
    secret: SharedSecret,
    clock: Arc<dyn Clock>,
}

impl BatterySensor {
    /// Percent drained per read.
    pub const DRAIN: f64 = 0.3;

    pub fn new(secret: SharedSecret, clock: Arc<dyn Clock>) -> Self {
        Self {
            level: Mutex::new(100.0),
            secret,
            clock,
        }
    }

    /// Current level, then drain.
    pub fn read(&self) -> BatteryPayload {
        let mut level = self.level.lock().unwrap_or_else(|p| p.into_inner());
        let current = round2(*level);
        *level = (*level - Self::DRAIN).max(0.0);
        BatteryPayload {
            batterie: current,
            timestamp: self.clock.now(),
            key: self.secret.expose().to_string(),
        }
    }
}

impl Sensor for BatterySensor {
    fn resource(&self) -> &'static str {
        "battery"
    }

    fn read_json(&self) -> Value {
        serde_json::to_value(self.read()).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Copy)]
struct Climate {
    temperature: f64,
    humidity: f64,
    pressure: f64,
}

/// Temperature/humidity/pressure leaf doing a bounded random walk.
pub struct TemperatureSensor {
    climate: Mutex<Climate>,
    secret: SharedSecret,
    clock: Arc<dyn Clock>,
}

impl TemperatureSensor {
    pub fn new(secret: SharedSecret, clock: Arc<dyn Clock>) -> Self {
        Self {
            climate: Mutex::new(Climate {
                temperature: 20.0,
                humidity: 50.0,
                pressure: 1013.0,
            }),
            secret,
            clock,
        }
    }

    /// Step the walk and report the new values.
    pub fn read(&self) -> TemperaturePayload {
        let mut climate = self.climate.lock().unwrap_or_else(|p| p.into_inner());
        let mut rng = rand::thread_rng();
        climate.temperature = (climate.temperature + rng.gen_range(-0.5..=0.5)).clamp(-20.0, 40.0);
        climate.humidity = (climate.humidity + rng.gen_range(-1.0..=1.0)).clamp(10.0, 90.0);
        climate.pressure = (climate.pressure + rng.gen_range(-0.8..=0.8)).clamp(950.0, 1050.0);
        TemperaturePayload {
            temperature: round2(climate.temperature),
            humidite: round2(climate.humidity),
            pression: round2(climate.pressure),
            timestamp: self.clock.now(),
            key: self.secret.expose().to_string(),
        }
    }
}

impl Sensor for TemperatureSensor {
    fn resource(&self) -> &'static str {
        "temperature"
    }

    fn read_json(&self) -> Value {
        serde_json::to_value(self.read()).unwrap_or(Value::Null)
    }
}
