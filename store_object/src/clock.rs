//! Time source for audit timestamps
//!
//! Stamps are truncated to a fixed number of sub-second digits so that the
//! value held in memory is exactly the value the database stores
//! (PostgreSQL keeps microseconds).

use chrono::{DateTime, Duration, Timelike, Utc};
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

/// Default sub-second digits, matching PostgreSQL `timestamptz`
pub const DEFAULT_TIMESTAMP_PRECISION: u16 = 6;

pub trait Clock: Send + Sync + Debug {
    /// Current UTC instant
    fn now(&self) -> DateTime<Utc>;
}

/// Drop sub-second digits beyond `precision` (0..=9)
pub fn truncate_to_precision(at: DateTime<Utc>, precision: u16) -> DateTime<Utc> {
    let precision = u32::from(precision.min(9));
    let step = 10u32.pow(9 - precision);
    let nanos = at.nanosecond();
    at.with_nanosecond(nanos - nanos % step).unwrap_or(at)
}

/// Wall clock
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    precision: u16,
}

impl SystemClock {
    pub fn new(precision: u16) -> Self {
        Self { precision }
    }

    pub fn precision(&self) -> u16 {
        self.precision
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(DEFAULT_TIMESTAMP_PRECISION)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        truncate_to_precision(Utc::now(), self.precision)
    }
}

/// Clock that only moves when told to
///
/// Clones share the same instant, so a test can keep a handle while the
/// store context owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        if let Ok(mut current) = self.current.lock() {
            *current = at;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut current) = self.current.lock() {
            *current += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.current.lock() {
            Ok(current) => *current,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
