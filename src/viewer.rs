//! Session-level presenter.
//!
//! [`Viewer`] wires a [`CaptureController`] to display state: it gates frames
//! through a [`FrameThrottle`], keeps the error banner, runs the
//! `Idle -> Starting -> Playing -> Idle` session machine and derives the
//! "processed" side of the view, which is the same frame with a cosmetic CSS
//! filter attached.

use std::{cell::RefCell, fmt, rc::Rc, str::FromStr};

use chrono::{DateTime, Local, TimeZone};
use tracing::debug;

use crate::{
    clock::{Clock, SystemClock},
    config::{CaptureOptions, TargetFps},
    controller::CaptureController,
    device::CameraBackend,
    error::CaptureError,
    frames::{FrameData, FrameStats},
    throttle::FrameThrottle,
    Error, Result,
};

/// Shown in place of statistics while no frame is displayed.
pub const AWAITING_DATASTREAM: &str = "Awaiting Datastream...";

/// Where the session is in its lifecycle. There is no paused state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    Starting,
    Playing,
}

/// Cosmetic filters for the processed view.
///
/// Nothing is computed from the pixels; each preset is a CSS `filter` value the
/// presentation layer applies to the raw frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProcessedFilter {
    /// Simulated edge detection.
    #[default]
    EdgeDetect,
    None,
    Grayscale,
    Sepia,
    Invert,
}

impl ProcessedFilter {
    pub const ALL: [ProcessedFilter; 5] = [
        ProcessedFilter::EdgeDetect,
        ProcessedFilter::None,
        ProcessedFilter::Grayscale,
        ProcessedFilter::Sepia,
        ProcessedFilter::Invert,
    ];

    /// Selection key, as accepted by [`FromStr`].
    pub fn key(self) -> &'static str {
        match self {
            ProcessedFilter::EdgeDetect => "default",
            ProcessedFilter::None => "none",
            ProcessedFilter::Grayscale => "grayscale",
            ProcessedFilter::Sepia => "sepia",
            ProcessedFilter::Invert => "invert",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProcessedFilter::EdgeDetect => "Edge Detect (Sim.)",
            ProcessedFilter::None => "None",
            ProcessedFilter::Grayscale => "Grayscale",
            ProcessedFilter::Sepia => "Sepia",
            ProcessedFilter::Invert => "Invert",
        }
    }

    /// CSS `filter` property value.
    pub fn css(self) -> &'static str {
        match self {
            ProcessedFilter::EdgeDetect => {
                "grayscale(1) contrast(2.5) invert(1) drop-shadow(0 0 3px #0ff)"
            }
            ProcessedFilter::None => "",
            ProcessedFilter::Grayscale => "grayscale(1)",
            ProcessedFilter::Sepia => "sepia(1)",
            ProcessedFilter::Invert => "invert(1)",
        }
    }
}

impl FromStr for ProcessedFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ProcessedFilter::ALL
            .into_iter()
            .find(|filter| filter.key() == s)
            .ok_or_else(|| Error::InvalidConfiguration(format!("unknown filter {s:?}")))
    }
}

impl fmt::Display for ProcessedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The processed side of the view: the displayed frame, untouched, plus the
/// filter to render it with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedView {
    frame: FrameData,
    filter: ProcessedFilter,
}

impl ProcessedView {
    pub fn image_url(&self) -> &str {
        self.frame.image_url()
    }

    pub fn css_filter(&self) -> &'static str {
        self.filter.css()
    }

    pub fn filter(&self) -> ProcessedFilter {
        self.filter
    }
}

/// Display strings for a frame's statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsPanel {
    pub fps: String,
    pub resolution: String,
    pub processing_time: String,
    pub timestamp: String,
}

impl StatsPanel {
    /// Format with the timestamp in the local time zone.
    pub fn from_stats(stats: &FrameStats) -> Self {
        Self::from_stats_in(stats, &Local)
    }

    pub fn from_stats_in<Tz: TimeZone>(stats: &FrameStats, tz: &Tz) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        Self {
            fps: format!("{:.1}", f64::from(stats.fps())),
            resolution: stats.resolution().to_string(),
            processing_time: format!("{} ms", stats.processing_time_ms()),
            timestamp: format_time_of_day(stats.timestamp_ms(), tz),
        }
    }
}

/// Epoch milliseconds as a 12-hour time of day, e.g. `3:04:05 PM`.
pub fn format_time_of_day<Tz: TimeZone>(epoch_ms: i64, tz: &Tz) -> String
where
    Tz::Offset: fmt::Display,
{
    match DateTime::from_timestamp_millis(epoch_ms) {
        Some(utc) => utc.with_timezone(tz).format("%-I:%M:%S %p").to_string(),
        None => "--:--:--".to_owned(),
    }
}

#[derive(Debug, Default)]
struct DisplayState {
    phase: SessionPhase,
    fps: TargetFps,
    frame: Option<FrameData>,
    error: Option<String>,
    throttle: FrameThrottle,
    filter: ProcessedFilter,
    /// Bumped by every start and stop. A start whose acquisition resolves
    /// after the token moved on no longer owns the phase.
    attempt: u64,
}

impl DisplayState {
    fn present(&mut self, frame: FrameData, display_fps: TargetFps, now_ms: f64) {
        if self.throttle.admit(now_ms, display_fps) {
            self.frame = Some(frame);
        }
    }

    fn fail(&mut self, err: &CaptureError) {
        if err.is_reportable() {
            self.error = Some(err.to_string());
        }
        self.phase = SessionPhase::Idle;
    }
}

/// A camera view with start/stop controls, a frame rate setting and an error
/// banner.
///
/// The display rate equals the configured capture rate.
///
/// # Examples
///
/// ```no_run
/// use camera_feed::{CaptureOptions, SyntheticCamera, Viewer};
///
/// # async fn run() -> Result<(), camera_feed::Error> {
/// let viewer = Viewer::new(SyntheticCamera::default(), CaptureOptions::default());
/// viewer.set_fps(10)?;
///
/// tokio::task::LocalSet::new()
///     .run_until(async {
///         let _ = viewer.start().await; // a failure is already in viewer.error()
///         tokio::time::sleep(std::time::Duration::from_millis(500)).await;
///         if let Some(stats) = viewer.stats_panel() {
///             println!("{} @ {} fps", stats.resolution, stats.fps);
///         }
///         viewer.stop();
///     })
///     .await;
/// # Ok(())
/// # }
/// ```
pub struct Viewer<B: CameraBackend> {
    controller: CaptureController<B>,
    state: Rc<RefCell<DisplayState>>,
    clock: Rc<dyn Clock>,
}

impl<B: CameraBackend> fmt::Debug for Viewer<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Viewer")
            .field("controller", &self.controller)
            .field("state", &self.state.borrow())
            .finish()
    }
}

impl<B: CameraBackend> Viewer<B> {
    pub fn new(backend: B, options: CaptureOptions) -> Self {
        Self::with_clock(backend, options, Rc::new(SystemClock::new()))
    }

    /// Use `clock` both for frame timestamps and for display throttling.
    pub fn with_clock(backend: B, options: CaptureOptions, clock: Rc<dyn Clock>) -> Self {
        let controller = CaptureController::with_clock(backend, options, Rc::clone(&clock));
        let state = Rc::new(RefCell::new(DisplayState::default()));

        let error_state = Rc::clone(&state);
        controller.on_error(move |err| error_state.borrow_mut().fail(err));

        let viewer = Self {
            controller,
            state,
            clock,
        };
        viewer.register_frame_handler();
        viewer
    }

    /// Bind the frame handler to the current display rate.
    fn register_frame_handler(&self) {
        let display_fps = self.state.borrow().fps;
        let state = Rc::clone(&self.state);
        let clock = Rc::clone(&self.clock);
        self.controller.on_frame(move |frame| {
            state
                .borrow_mut()
                .present(frame, display_fps, clock.monotonic_ms());
        });
    }

    pub fn backend(&self) -> &B {
        self.controller.backend()
    }

    /// Start capturing at the configured frame rate.
    ///
    /// Does nothing unless the session is idle. Clears the error banner and
    /// resets the throttle so the first frame shows immediately.
    ///
    /// # Errors
    ///
    /// Returns the capture failure for information only: it has already been
    /// put in the error banner and the session is back to idle.
    pub async fn start(&self) -> std::result::Result<(), CaptureError> {
        let (fps, attempt) = {
            let mut state = self.state.borrow_mut();
            if state.phase != SessionPhase::Idle {
                debug!(phase = ?state.phase, "viewer already started");
                return Ok(());
            }
            state.error = None;
            state.throttle.reset();
            state.phase = SessionPhase::Starting;
            state.attempt = state.attempt.wrapping_add(1);
            (state.fps, state.attempt)
        };

        let result = self.controller.start(fps).await;

        let mut state = self.state.borrow_mut();
        if let Err(err) = &result {
            debug!(error = %err, "start failed, error was handled");
        }
        if state.attempt != attempt {
            debug!("start superseded by a later stop or start");
            return result;
        }
        state.phase = match &result {
            Ok(()) => SessionPhase::Playing,
            Err(_) => SessionPhase::Idle,
        };
        result
    }

    /// Stop capturing and clear the displayed frame.
    pub fn stop(&self) {
        self.controller.stop();
        let mut state = self.state.borrow_mut();
        state.attempt = state.attempt.wrapping_add(1);
        state.phase = SessionPhase::Idle;
        state.frame = None;
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.borrow().phase
    }

    pub fn is_playing(&self) -> bool {
        self.phase() == SessionPhase::Playing
    }

    pub fn fps(&self) -> TargetFps {
        self.state.borrow().fps
    }

    /// Change the target frame rate.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfiguration`] if the value is outside 1..=30 or the
    /// session is not idle.
    pub fn set_fps(&self, fps: u32) -> Result<()> {
        {
            let mut state = self.state.borrow_mut();
            if state.phase != SessionPhase::Idle {
                return Err(Error::InvalidConfiguration(
                    "frame rate can only be changed while stopped".into(),
                ));
            }
            state.fps = TargetFps::new(fps)?;
        }
        self.register_frame_handler();
        Ok(())
    }

    /// Currently displayed frame.
    pub fn frame(&self) -> Option<FrameData> {
        self.state.borrow().frame.clone()
    }

    /// Message in the error banner.
    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    pub fn dismiss_error(&self) {
        self.state.borrow_mut().error = None;
    }

    pub fn filter(&self) -> ProcessedFilter {
        self.state.borrow().filter
    }

    pub fn set_filter(&self, filter: ProcessedFilter) {
        self.state.borrow_mut().filter = filter;
    }

    pub fn processed_view(&self) -> Option<ProcessedView> {
        let state = self.state.borrow();
        state.frame.as_ref().map(|frame| ProcessedView {
            frame: frame.clone(),
            filter: state.filter,
        })
    }

    pub fn stats_panel(&self) -> Option<StatsPanel> {
        self.state
            .borrow()
            .frame
            .as_ref()
            .map(|frame| StatsPanel::from_stats(frame.stats()))
    }
}
