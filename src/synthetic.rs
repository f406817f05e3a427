//! In-process camera that renders a moving test pattern.
//!
//! Useful for demos and tests: acquisition can be scripted to fail or to take
//! time, the stream can report 0x0 while "negotiating", and the device counts
//! acquisitions and live tracks so callers can verify resource handling.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
    time::Duration,
};

use crate::{
    config::VideoConstraints,
    device::{CameraBackend, VideoStream},
    error::AcquireError,
    frames::{PixelFormat, Resolution, VideoFrame},
    Error, Result,
};

struct DeviceState {
    native: Resolution,
    failure: RefCell<Option<AcquireError>>,
    acquire_delay: Cell<Duration>,
    negotiating_polls: Cell<u32>,
    acquisitions: Cell<usize>,
    live_tracks: Cell<usize>,
    end_count: Cell<u64>,
}

/// A scripted camera device.
///
/// Clones share the same device, so a test can keep one handle for inspection
/// while the controller owns another.
///
/// # Examples
///
/// ```
/// use camera_feed::{AcquireError, SyntheticCamera};
///
/// let camera = SyntheticCamera::builder()
///     .native_resolution(640, 480)
///     .failure(AcquireError::NotFound)
///     .build();
/// assert_eq!(camera.acquisitions(), 0);
/// ```
#[derive(Clone)]
pub struct SyntheticCamera {
    state: Rc<DeviceState>,
}

impl fmt::Debug for SyntheticCamera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticCamera")
            .field("native", &self.state.native)
            .field("failure", &self.state.failure.borrow())
            .field("acquisitions", &self.state.acquisitions.get())
            .field("live_tracks", &self.state.live_tracks.get())
            .finish()
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SyntheticCamera {
    /// Create a builder for configuring a synthetic camera
    pub fn builder() -> SyntheticCameraBuilder {
        SyntheticCameraBuilder::new()
    }

    pub fn native_resolution(&self) -> Resolution {
        self.state.native
    }

    /// Number of acquisition attempts so far, failed ones included.
    pub fn acquisitions(&self) -> usize {
        self.state.acquisitions.get()
    }

    /// Streams granted and not yet stopped.
    pub fn live_tracks(&self) -> usize {
        self.state.live_tracks.get()
    }

    /// Script the outcome of subsequent acquisitions. `None` lets them succeed.
    pub fn set_failure(&self, failure: Option<AcquireError>) {
        *self.state.failure.borrow_mut() = failure;
    }

    /// End every open stream as if the device were unplugged.
    pub fn end_stream(&self) {
        self.state.end_count.set(self.state.end_count.get() + 1);
    }
}

impl CameraBackend for SyntheticCamera {
    type Stream = SyntheticStream;

    async fn acquire(
        &self,
        constraints: &VideoConstraints,
    ) -> std::result::Result<SyntheticStream, AcquireError> {
        let state = &self.state;
        state.acquisitions.set(state.acquisitions.get() + 1);

        let delay = state.acquire_delay.get();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = state.failure.borrow().clone() {
            return Err(err);
        }

        let ideal = Resolution::new(constraints.ideal_width, constraints.ideal_height);
        let granted = if ideal.fits_within(state.native) {
            ideal
        } else {
            state.native
        };

        state.live_tracks.set(state.live_tracks.get() + 1);

        Ok(SyntheticStream {
            device: Rc::clone(state),
            resolution: granted,
            polls_remaining: Cell::new(state.negotiating_polls.get()),
            epoch: state.end_count.get(),
            frame_index: 0,
            stopped: false,
        })
    }
}

/// Builder for configuring a [`SyntheticCamera`] with ergonomic method chaining
#[derive(Debug, Clone)]
pub struct SyntheticCameraBuilder {
    native: Resolution,
    failure: Option<AcquireError>,
    acquire_delay: Duration,
    negotiating_polls: u32,
}

impl SyntheticCameraBuilder {
    pub fn new() -> Self {
        Self {
            native: Resolution::new(1280, 720),
            failure: None,
            acquire_delay: Duration::ZERO,
            negotiating_polls: 0,
        }
    }

    /// Largest mode the device offers (default 1280x720)
    #[must_use]
    pub fn native_resolution(mut self, width: u32, height: u32) -> Self {
        self.native = Resolution::new(width, height);
        self
    }

    /// Fail every acquisition with this error
    #[must_use]
    pub fn failure(mut self, failure: AcquireError) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Time acquisition takes to resolve, like an open permission prompt
    #[must_use]
    pub fn acquire_delay(mut self, delay: Duration) -> Self {
        self.acquire_delay = delay;
        self
    }

    /// Report 0x0 for the first `polls` dimension queries of each stream
    #[must_use]
    pub fn negotiating_polls(mut self, polls: u32) -> Self {
        self.negotiating_polls = polls;
        self
    }

    pub fn build(self) -> SyntheticCamera {
        SyntheticCamera {
            state: Rc::new(DeviceState {
                native: self.native,
                failure: RefCell::new(self.failure),
                acquire_delay: Cell::new(self.acquire_delay),
                negotiating_polls: Cell::new(self.negotiating_polls),
                acquisitions: Cell::new(0),
                live_tracks: Cell::new(0),
                end_count: Cell::new(0),
            }),
        }
    }
}

impl Default for SyntheticCameraBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream handed out by [`SyntheticCamera`]. Stops its track when dropped.
pub struct SyntheticStream {
    device: Rc<DeviceState>,
    resolution: Resolution,
    polls_remaining: Cell<u32>,
    epoch: u64,
    frame_index: u64,
    stopped: bool,
}

impl fmt::Debug for SyntheticStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticStream")
            .field("resolution", &self.resolution)
            .field("frame_index", &self.frame_index)
            .field("stopped", &self.stopped)
            .finish()
    }
}

impl SyntheticStream {
    /// BGRA diagonal gradient that shifts one step per frame.
    fn render(&self) -> Vec<u8> {
        let Resolution { width, height } = self.resolution;
        let (width, height) = (width.max(1), height.max(1));
        let shift = (self.frame_index % u64::from(width)) as u32;
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                let r = ((x + shift) % width * 255 / width) as u8;
                let g = (y * 255 / height) as u8;
                let b = (x + y + shift) as u8;
                data.extend_from_slice(&[b, g, r, u8::MAX]);
            }
        }
        data
    }
}

impl VideoStream for SyntheticStream {
    fn dimensions(&self) -> Resolution {
        if self.stopped {
            return Resolution::default();
        }
        let remaining = self.polls_remaining.get();
        if remaining > 0 {
            self.polls_remaining.set(remaining - 1);
            return Resolution::default();
        }
        self.resolution
    }

    fn snapshot(&mut self) -> Result<VideoFrame> {
        if self.stopped {
            return Err(Error::InvalidFrame("Snapshot from a stopped stream".into()));
        }
        let data = self.render();
        self.frame_index += 1;
        VideoFrame::new(
            self.resolution.width,
            self.resolution.height,
            PixelFormat::BGRA,
            self.resolution.width as usize * 4,
            data,
        )
    }

    fn is_live(&self) -> bool {
        !self.stopped && self.epoch == self.device.end_count.get()
    }

    fn stop_tracks(&mut self) {
        if !self.stopped {
            self.stopped = true;
            let live = self.device.live_tracks.get();
            self.device.live_tracks.set(live.saturating_sub(1));
        }
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}
