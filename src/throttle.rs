//! Display-rate gate between the sampling tick and the display state.
//!
//! Frames arrive at the capture rate; the throttle surfaces at most one per
//! display interval (`1000 / display_fps` ms). The display rate is set
//! independently of the capture rate.

use crate::config::TargetFps;

/// Sampling ticks land on whole milliseconds, so consecutive ticks at a
/// fractional period (66.667 ms at 15 fps) alternate between 66 and 67 ms.
/// Gaps up to this much short of the interval still count as a full interval.
pub const TIMER_SLACK_MS: f64 = 1.0;

/// Accepts a frame only if at least one display interval, less
/// [`TIMER_SLACK_MS`], has passed since the previously accepted one.
///
/// # Examples
///
/// ```
/// use camera_feed::{FrameThrottle, TargetFps};
///
/// let fps = TargetFps::new(10)?;
/// let mut throttle = FrameThrottle::new();
/// assert!(throttle.admit(5_000.0, fps)); // first frame always passes
/// assert!(!throttle.admit(5_050.0, fps));
/// assert!(throttle.admit(5_100.0, fps));
/// # Ok::<(), camera_feed::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct FrameThrottle {
    last_display_ms: Option<f64>,
}

impl FrameThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the last display time so the next frame is accepted immediately.
    pub fn reset(&mut self) {
        self.last_display_ms = None;
    }

    /// Monotonic time of the last accepted frame, if any.
    pub fn last_display_ms(&self) -> Option<f64> {
        self.last_display_ms
    }

    /// Decide whether a frame arriving at `now_ms` should be displayed.
    ///
    /// `now_ms` must come from a monotonic source. A timestamp earlier than the
    /// last accepted one is rejected and never moves the gate backwards.
    pub fn admit(&mut self, now_ms: f64, display_fps: TargetFps) -> bool {
        let accept = match self.last_display_ms {
            None => true,
            Some(last) => now_ms - last + TIMER_SLACK_MS >= display_fps.interval_ms(),
        };
        if accept {
            self.last_display_ms = Some(now_ms);
        }
        accept
    }
}
