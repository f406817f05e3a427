//! Error types for the camera-feed library.

use thiserror::Error;

/// The main error type for camera-feed operations.
///
/// Covers configuration validation, frame encoding and capture failures. Capture
/// failures raised while starting a session convert into this type through
/// [`Error::Capture`].
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration parameters are invalid.
    ///
    /// Raised for an out-of-range target frame rate, or for a frame rate change
    /// requested while a session is running.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Frame data is invalid or corrupted.
    #[error("Invalid frame data: {0}")]
    InvalidFrame(String),

    /// PNG or JPEG encoding of a snapshot failed.
    #[error("Image encoding failed: {0}")]
    Encoding(String),

    /// Camera acquisition failed or the session was torn down.
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// Classified camera failure.
///
/// The `Display` text of each variant is the user-facing message shown by the
/// presentation layer, so it must stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// The user (or platform policy) declined camera access.
    #[error("Camera permission was denied. Please grant permission and try again.")]
    PermissionDenied,

    /// The platform has no video capture device.
    #[error("No camera was found on this device.")]
    DeviceNotFound,

    /// Any other acquisition failure.
    #[error("Could not access the camera. Please ensure permissions are granted.")]
    Unknown,

    /// A live stream stopped delivering (device unplugged, track ended).
    #[error("The camera stream ended unexpectedly.")]
    StreamEnded,

    /// `stop` ran while acquisition was still pending; the granted stream was
    /// released without being used. Never delivered to the error handler.
    #[error("Camera start was cancelled.")]
    Aborted,
}

impl CaptureError {
    /// Map a platform acquisition failure onto the user-facing taxonomy.
    pub fn classify(err: &AcquireError) -> Self {
        match err {
            AcquireError::NotAllowed => CaptureError::PermissionDenied,
            AcquireError::NotFound => CaptureError::DeviceNotFound,
            AcquireError::Other { .. } => CaptureError::Unknown,
        }
    }

    /// Whether this error should be surfaced to the user.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, CaptureError::Aborted)
    }
}

/// Failure reported by a [`CameraBackend`](crate::CameraBackend) while
/// acquiring a stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquireError {
    /// Access to the device was refused.
    #[error("NotAllowedError: camera access was refused")]
    NotAllowed,

    /// No matching capture device exists.
    #[error("NotFoundError: no capture device available")]
    NotFound,

    /// Anything else the platform reported.
    #[error("{name}: {message}")]
    Other { name: String, message: String },
}

impl AcquireError {
    /// Build an acquisition error from a platform error name.
    ///
    /// Both the current and the legacy spellings of the permission and
    /// missing-device names are recognised.
    ///
    /// # Examples
    ///
    /// ```
    /// use camera_feed::AcquireError;
    ///
    /// assert_eq!(AcquireError::from_name("NotAllowedError", ""), AcquireError::NotAllowed);
    /// assert!(matches!(
    ///     AcquireError::from_name("OverconstrainedError", "width"),
    ///     AcquireError::Other { .. }
    /// ));
    /// ```
    pub fn from_name(name: &str, message: impl Into<String>) -> Self {
        match name {
            "NotAllowedError" | "PermissionDeniedError" => AcquireError::NotAllowed,
            "NotFoundError" | "DevicesNotFoundError" => AcquireError::NotFound,
            _ => AcquireError::Other {
                name: name.to_owned(),
                message: message.into(),
            },
        }
    }
}
