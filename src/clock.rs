//! Time sources for frame timestamps and display throttling.

use std::{cell::Cell, rc::Rc};

use tokio::time::Instant;

/// A source of both monotonic and wall-clock time.
///
/// Monotonic time drives the display throttle and must never go backwards.
/// Wall-clock time stamps each frame in epoch milliseconds.
pub trait Clock {
    /// Milliseconds since an arbitrary, fixed origin.
    fn monotonic_ms(&self) -> f64;

    /// Milliseconds since the Unix epoch.
    fn epoch_ms(&self) -> i64;
}

/// The real clock.
///
/// Monotonic time is read from [`tokio::time::Instant`], so it follows a paused
/// test runtime.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic_ms(&self) -> f64 {
        self.origin.elapsed().as_nanos() as f64 / 1_000_000.0
    }

    fn epoch_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A hand-driven clock for tests and simulations.
///
/// Clones share the same time.
///
/// # Examples
///
/// ```
/// use camera_feed::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1_700_000_000_000);
/// clock.advance_ms(250.0);
/// assert_eq!(clock.monotonic_ms(), 250.0);
/// assert_eq!(clock.epoch_ms(), 1_700_000_000_250);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    elapsed_ms: Rc<Cell<f64>>,
    epoch_origin_ms: i64,
}

impl ManualClock {
    /// Start at monotonic 0 and the given wall-clock time.
    pub fn new(epoch_origin_ms: i64) -> Self {
        Self {
            elapsed_ms: Rc::new(Cell::new(0.0)),
            epoch_origin_ms,
        }
    }

    /// Move time forward. Negative steps are ignored.
    pub fn advance_ms(&self, ms: f64) {
        if ms > 0.0 {
            self.elapsed_ms.set(self.elapsed_ms.get() + ms);
        }
    }

    /// Jump to an absolute monotonic time, if it is not in the past.
    pub fn set_ms(&self, ms: f64) {
        if ms > self.elapsed_ms.get() {
            self.elapsed_ms.set(ms);
        }
    }
}

impl Clock for ManualClock {
    fn monotonic_ms(&self) -> f64 {
        self.elapsed_ms.get()
    }

    fn epoch_ms(&self) -> i64 {
        self.epoch_origin_ms + self.elapsed_ms.get() as i64
    }
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn monotonic_ms(&self) -> f64 {
        (**self).monotonic_ms()
    }

    fn epoch_ms(&self) -> i64 {
        (**self).epoch_ms()
    }
}
