//! Physical range checks for readings.
//!
//! Used identically by the on-demand collection path and the event-stream
//! ingestion path. A single bad or missing field rejects the whole reading.

use std::ops::RangeInclusive;

use thiserror::Error;

use crate::reading::{CanonicalReading, Reading};

/// Accepted latitude range in degrees.
pub const LATITUDE_RANGE: RangeInclusive<f64> = -90.0..=90.0;
/// Accepted longitude range in degrees.
pub const LONGITUDE_RANGE: RangeInclusive<f64> = -180.0..=180.0;
/// Accepted temperature range in degrees Celsius.
pub const TEMPERATURE_RANGE: RangeInclusive<f64> = -40.0..=60.0;
/// Accepted relative humidity range in percent.
pub const HUMIDITY_RANGE: RangeInclusive<f64> = 0.0..=100.0;
/// Accepted pressure range in hPa.
pub const PRESSURE_RANGE: RangeInclusive<f64> = 900.0..=1100.0;
/// Accepted battery range in percent.
pub const BATTERY_RANGE: RangeInclusive<f64> = 0.0..=100.0;

/// Why a reading was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Field absent from the canonical reading
    #[error("invalid {field}: missing")]
    Missing {
        /// Field name
        field: &'static str,
    },

    /// Field outside its physical range (NaN included)
    #[error("invalid {field}: {value} not in [{min}, {max}]")]
    OutOfRange {
        /// Field name
        field: &'static str,
        /// Offending value
        value: f64,
        /// Lower bound
        min: f64,
        /// Upper bound
        max: f64,
    },
}

fn check(
    field: &'static str,
    value: Option<f64>,
    range: RangeInclusive<f64>,
) -> Result<f64, ValidationError> {
    let value = value.ok_or(ValidationError::Missing { field })?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

/// Range-check every field and build an immutable [`Reading`].
pub fn validate(reading: &CanonicalReading) -> Result<Reading, ValidationError> {
    let latitude = check("latitude", reading.latitude, LATITUDE_RANGE)?;
    let longitude = check("longitude", reading.longitude, LONGITUDE_RANGE)?;
    let temperature = check("temperature", reading.temperature, TEMPERATURE_RANGE)?;
    let humidity = check("humidity", reading.humidity, HUMIDITY_RANGE)?;
    let pressure = check("pressure", reading.pressure, PRESSURE_RANGE)?;
    let battery_pct = check("battery_pct", reading.battery_pct, BATTERY_RANGE)?;
    let timestamp = reading
        .timestamp
        .filter(|ts| ts.is_finite())
        .ok_or(ValidationError::Missing { field: "timestamp" })?;

    Ok(Reading::new(
        latitude,
        longitude,
        temperature,
        humidity,
        pressure,
        battery_pct,
        timestamp,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paris() -> CanonicalReading {
        CanonicalReading {
            latitude: Some(48.8566),
            longitude: Some(2.3522),
            temperature: Some(20.0),
            humidity: Some(50.0),
            pressure: Some(1013.0),
            battery_pct: Some(90.0),
            timestamp: Some(1_700_000_000.0),
            leader_id: Some("gps".to_string()),
        }
    }

    #[test]
    fn test_valid_reading() {
        let reading = validate(&paris()).unwrap();
        assert_eq!(reading.latitude(), 48.8566);
        assert_eq!(reading.battery_pct(), 90.0);
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let mut edge = paris();
        edge.latitude = Some(-90.0);
        edge.longitude = Some(180.0);
        edge.temperature = Some(60.0);
        edge.humidity = Some(0.0);
        edge.pressure = Some(900.0);
        edge.battery_pct = Some(100.0);
        assert!(validate(&edge).is_ok());
    }

    #[test]
    fn test_battery_over_100_rejected() {
        let mut reading = paris();
        reading.battery_pct = Some(150.0);
        assert_eq!(
            validate(&reading),
            Err(ValidationError::OutOfRange {
                field: "battery_pct",
                value: 150.0,
                min: 0.0,
                max: 100.0
            })
        );
    }

    #[test]
    fn test_out_of_range_fields() {
        let cases: Vec<(&str, Box<dyn Fn(&mut CanonicalReading)>)> = vec![
            ("latitude", Box::new(|r| r.latitude = Some(300.0))),
            ("longitude", Box::new(|r| r.longitude = Some(-181.0))),
            ("temperature", Box::new(|r| r.temperature = Some(120.0))),
            ("humidity", Box::new(|r| r.humidity = Some(150.0))),
            ("pressure", Box::new(|r| r.pressure = Some(700.0))),
            ("battery_pct", Box::new(|r| r.battery_pct = Some(-1.0))),
        ];
        for (field, mutate) in cases {
            let mut reading = paris();
            mutate(&mut reading);
            match validate(&reading) {
                Err(ValidationError::OutOfRange { field: f, .. }) => assert_eq!(f, field),
                other => panic!("{} should be rejected, got {:?}", field, other),
            }
        }
    }

    #[test]
    fn test_missing_field_rejected() {
        let mut reading = paris();
        reading.humidity = None;
        assert_eq!(
            validate(&reading),
            Err(ValidationError::Missing { field: "humidity" })
        );

        let mut reading = paris();
        reading.timestamp = None;
        assert_eq!(
            validate(&reading),
            Err(ValidationError::Missing { field: "timestamp" })
        );
    }

    #[test]
    fn test_nan_rejected() {
        let mut reading = paris();
        reading.pressure = Some(f64::NAN);
        assert!(matches!(
            validate(&reading),
            Err(ValidationError::OutOfRange { field: "pressure", .. })
        ));
    }
}
