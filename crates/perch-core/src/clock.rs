//! Injectable time source.
//!
//! The engine reads the clock at three points (freshness checks, history
//! stamps, prediction math). Hiding it behind a trait keeps identical
//! input sequences reproducible in tests without sleeping real seconds.

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Monotonic-comparable time in seconds. Wire fixes share this domain
/// (`ts_unix_ms / 1000`).
pub trait Clock: Send {
    fn now(&self) -> f64;
}

/// Wall clock: seconds since the UNIX epoch.
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

/// Manually-advanced clock. Cloning shares the underlying value, so a
/// test can keep one handle and hand another to the engine.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<Mutex<f64>>);

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self(Arc::new(Mutex::new(start)))
    }

    pub fn set(&self, t: f64) {
        *self.0.lock().unwrap() = t;
    }

    pub fn advance(&self, dt: f64) {
        *self.0.lock().unwrap() += dt;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.0.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_shares_value_across_clones() {
        let clock = ManualClock::new(100.0);
        let handle = clock.clone();
        handle.advance(2.5);
        assert_eq!(clock.now(), 102.5);
        clock.set(7.0);
        assert_eq!(handle.now(), 7.0);
    }
}
