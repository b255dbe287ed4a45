//! Injectable wall clock.

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of Unix time in fractional seconds.
pub trait Clock: Send + Sync {
    /// Current Unix time in seconds.
    fn now(&self) -> f64;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// A clock that only moves when told to. Cloning shares the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    /// Start at the given Unix time.
    pub fn starting_at(now: f64) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Move forward by `secs`.
    pub fn advance(&self, secs: f64) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += secs;
    }

    /// Jump to an absolute time.
    pub fn set(&self, value: f64) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = value;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}
