//! Comparator Clock
//!
//! Time source for the comparator. The comparator samples the clock once per
//! tick; every triplet drained in that tick is stamped with the same instant.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Nanoseconds since Unix epoch (wall clock) or since an arbitrary origin (simulated).
pub type Nanos = i64;

pub const NANOS_PER_MILLI: i64 = 1_000_000;
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Convert a nanosecond span to fractional seconds.
#[inline]
pub fn nanos_to_secs(nanos: Nanos) -> f64 {
    nanos as f64 / NANOS_PER_SEC as f64
}

/// Convert a nanosecond span to fractional milliseconds.
#[inline]
pub fn nanos_to_millis(nanos: Nanos) -> f64 {
    nanos as f64 / NANOS_PER_MILLI as f64
}

/// Anything that can tell the comparator what time it is.
pub trait Clock {
    fn now(&self) -> Nanos;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Nanos {
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    }
}

/// Monotonic manually-advanced clock.
///
/// # Contract
/// - `now()` returns whatever was last set, never system time
/// - `advance_to()` only moves forward
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    current: Nanos,
}

impl SimClock {
    #[inline]
    pub fn new(start_time: Nanos) -> Self {
        Self {
            current: start_time,
        }
    }

    #[inline]
    pub fn now(&self) -> Nanos {
        self.current
    }

    /// Advance clock to a new time. Earlier times are ignored.
    #[inline]
    pub fn advance_to(&mut self, new_time: Nanos) {
        debug_assert!(
            new_time >= self.current,
            "SimClock: cannot go backward from {} to {}",
            self.current,
            new_time
        );
        self.current = self.current.max(new_time);
    }

    /// Advance clock by a non-negative delta.
    #[inline]
    pub fn advance_by(&mut self, delta: Nanos) {
        debug_assert!(delta >= 0, "SimClock: delta must be non-negative");
        self.current += delta.max(0);
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.current / NANOS_PER_SEC;
        let nanos = self.current % NANOS_PER_SEC;
        write!(f, "{}.{:09}s", secs, nanos)
    }
}

/// Cloneable handle to a [`SimClock`].
///
/// The comparator owns one clone; a replay driver or test keeps another and
/// advances time between ticks.
#[derive(Debug, Clone, Default)]
pub struct SharedSimClock {
    inner: Arc<Mutex<SimClock>>,
}

impl SharedSimClock {
    pub fn new(start_time: Nanos) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimClock::new(start_time))),
        }
    }

    pub fn advance_to(&self, new_time: Nanos) {
        self.inner.lock().advance_to(new_time);
    }

    pub fn advance_by(&self, delta: Nanos) {
        self.inner.lock().advance_by(delta);
    }

    pub fn advance_millis(&self, millis: i64) {
        self.advance_by(millis * NANOS_PER_MILLI);
    }
}

impl Clock for SharedSimClock {
    fn now(&self) -> Nanos {
        self.inner.lock().now()
    }
}
