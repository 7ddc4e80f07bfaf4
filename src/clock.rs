//! Injectable time source

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// Source of the current instant, replaceable for deterministic testing
pub trait Clock: Send + Sync {
    /// Get the current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for deterministic tests
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Move the clock forward by fractional seconds
    pub fn advance_secs(&self, secs: f64) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = *current + delta_from_secs(secs);
    }

    /// Jump the clock to an absolute instant
    pub fn set(&self, to: DateTime<Utc>) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Convert fractional seconds to a chrono duration at millisecond precision
pub(crate) fn delta_from_secs(secs: f64) -> Duration {
    Duration::milliseconds((secs * 1000.0).round() as i64)
}
