//! Camera capture with fixed-rate sampling and display-rate throttling.
//!
//! This crate drives a camera device through start/stop sessions, samples it on
//! a fixed tick, encodes each sample as an image data URL with synthetic
//! statistics, and gates the resulting frames to a display rate for a raw and a
//! cosmetically filtered side-by-side view.
//!
//! # Quick Start
//!
//! ```no_run
//! use camera_feed::{CaptureOptions, SyntheticCamera, Viewer};
//! use std::time::Duration;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), camera_feed::Error> {
//!     let viewer = Viewer::new(SyntheticCamera::default(), CaptureOptions::default());
//!     viewer.set_fps(15)?;
//!
//!     tokio::task::LocalSet::new()
//!         .run_until(async {
//!             if viewer.start().await.is_ok() {
//!                 tokio::time::sleep(Duration::from_secs(1)).await;
//!                 if let Some(stats) = viewer.stats_panel() {
//!                     println!("{} {} {}", stats.resolution, stats.processing_time, stats.timestamp);
//!                 }
//!             }
//!             viewer.stop();
//!         })
//!         .await;
//!     Ok(())
//! }
//! ```
//!
//! # Core Concepts
//!
//! ## Capture
//!
//! [`CaptureController`] owns the device lifecycle. `start` acquires a stream
//! from a [`CameraBackend`] (ideal 1280x720, video only) and schedules a
//! sampling tick every `1000 / fps` ms; `stop` cancels the tick and then
//! releases every track. Both are idempotent. Failures are classified into
//! [`CaptureError`] and delivered to the registered error handler as well as
//! returned from `start`.
//!
//! ## Throttling
//!
//! [`FrameThrottle`] accepts a frame only when a full display interval has
//! passed since the last accepted one. Resetting it lets the next frame through
//! immediately.
//!
//! ## Presentation
//!
//! [`Viewer`] combines both with the session state machine
//! (`Idle -> Starting -> Playing -> Idle`), the error banner and the processed
//! view filter presets.
//!
//! # Threading
//!
//! Everything runs on a single thread. Controllers and viewers are `!Send` and
//! their `start` must be awaited inside a [`tokio::task::LocalSet`].
//!
//! # Simulated output
//!
//! No image processing happens. The processed view is the raw frame with a CSS
//! filter, and the processing time in [`FrameStats`] is a random value in
//! 5..10 ms.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

// Internal modules
mod error;

// Public modules
pub mod clock;
pub mod config;
pub mod controller;
pub mod device;
pub mod frames;
pub mod surface;
pub mod synthetic;
pub mod throttle;
pub mod viewer;

// Re-exports
pub use {
    clock::{Clock, ManualClock, SystemClock},
    config::{CaptureOptions, CaptureOptionsBuilder, TargetFps, VideoConstraints},
    controller::{CaptureController, ErrorHandler, FrameHandler},
    device::{CameraBackend, VideoStream},
    error::*,
    frames::{FrameData, FrameStats, ImageFormat, PixelFormat, Resolution, VideoFrame},
    surface::DecodeSurface,
    synthetic::{SyntheticCamera, SyntheticCameraBuilder, SyntheticStream},
    throttle::{FrameThrottle, TIMER_SLACK_MS},
    viewer::{
        format_time_of_day, ProcessedFilter, ProcessedView, SessionPhase, StatsPanel, Viewer,
        AWAITING_DATASTREAM,
    },
};

/// Alias for Result with our Error type
pub type Result<T> = std::result::Result<T, crate::error::Error>;
