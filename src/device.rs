//! The device capability boundary.
//!
//! A [`CameraBackend`] hands out [`VideoStream`]s. The controller owns the
//! stream for the lifetime of one session and releases it on `stop`, on a fatal
//! stream end, or when the controller is dropped.

use crate::{
    config::VideoConstraints,
    error::AcquireError,
    frames::{Resolution, VideoFrame},
    Result,
};

/// A source of video capture streams.
///
/// Acquisition may suspend for as long as the platform needs, for instance
/// while a permission prompt is open. No timeout is applied by the caller.
#[allow(async_fn_in_trait)]
pub trait CameraBackend {
    type Stream: VideoStream + 'static;

    /// Open a video-only stream, honouring `constraints` where the device can.
    async fn acquire(
        &self,
        constraints: &VideoConstraints,
    ) -> std::result::Result<Self::Stream, AcquireError>;
}

/// An open capture stream.
pub trait VideoStream {
    /// Dimensions the device currently reports.
    ///
    /// Zero in either dimension means the device is still negotiating and no
    /// frame can be taken yet.
    fn dimensions(&self) -> Resolution;

    /// Copy the current image at native resolution.
    fn snapshot(&mut self) -> Result<VideoFrame>;

    /// `false` once the platform ended the stream on its own.
    fn is_live(&self) -> bool {
        true
    }

    /// Stop and release every track of the stream. Must be idempotent.
    fn stop_tracks(&mut self);
}
