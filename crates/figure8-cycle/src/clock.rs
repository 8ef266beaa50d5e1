//! Time sources for the controller.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

/// A monotonic source of wall-clock seconds.
pub trait Clock: Send + Sync {
    /// Seconds since an arbitrary, fixed origin.
    fn now(&self) -> f64;
}

/// Production clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock. Clones share the same time, so a test can keep one
/// handle and give the other to a controller.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    pub fn set(&self, t: f64) {
        *self.now.lock() = t;
    }

    pub fn advance(&self, dt: f64) {
        *self.now.lock() += dt;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock()
    }
}
