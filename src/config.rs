//! Capture configuration: target frame rate, device constraints and encoding.

use std::{fmt, time::Duration};

use crate::{frames::ImageFormat, Error, Result};

/// Target frames per second for sampling and display.
///
/// Always within [`TargetFps::MIN`]..=[`TargetFps::MAX`].
///
/// # Examples
///
/// ```
/// use camera_feed::TargetFps;
///
/// let fps = TargetFps::new(30)?;
/// assert_eq!(fps.get(), 30);
/// assert!(TargetFps::new(0).is_err());
/// assert!(TargetFps::new(31).is_err());
/// # Ok::<(), camera_feed::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetFps(u32);

impl TargetFps {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 30;

    /// Validate a frame rate.
    pub fn new(fps: u32) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&fps) {
            Ok(Self(fps))
        } else {
            Err(Error::InvalidConfiguration(format!(
                "target fps {fps} is outside {}..={}",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Time between two frames, `1000 / fps` milliseconds.
    pub fn period(self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.0))
    }

    /// Same as [`period`](Self::period) as fractional milliseconds.
    pub fn interval_ms(self) -> f64 {
        1000.0 / f64::from(self.0)
    }
}

impl Default for TargetFps {
    fn default() -> Self {
        Self(15)
    }
}

impl fmt::Display for TargetFps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for TargetFps {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Self::new(value)
    }
}

/// What to ask the device for when acquiring a stream.
///
/// Streams are always video only. The ideal resolution is a preference;
/// backends grant whatever the device actually offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 1280,
            ideal_height: 720,
        }
    }
}

/// Options for a [`CaptureController`](crate::CaptureController).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureOptions {
    pub constraints: VideoConstraints,
    pub image_format: ImageFormat,
}

impl CaptureOptions {
    /// Create a builder for configuring capture options
    pub fn builder() -> CaptureOptionsBuilder {
        CaptureOptionsBuilder::new()
    }
}

/// Builder for configuring [`CaptureOptions`] with ergonomic method chaining
#[derive(Debug, Clone, Default)]
pub struct CaptureOptionsBuilder {
    constraints: Option<VideoConstraints>,
    image_format: Option<ImageFormat>,
}

impl CaptureOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preferred device resolution
    #[must_use]
    pub fn ideal_resolution(mut self, width: u32, height: u32) -> Self {
        let mut constraints = self.constraints.unwrap_or_default();
        constraints.ideal_width = width;
        constraints.ideal_height = height;
        self.constraints = Some(constraints);
        self
    }

    #[must_use]
    pub fn constraints(mut self, constraints: VideoConstraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    /// Encoding used for each frame's image URL
    #[must_use]
    pub fn image_format(mut self, format: ImageFormat) -> Self {
        self.image_format = Some(format);
        self
    }

    /// Build the options, validating the requested resolution and JPEG quality.
    pub fn build(self) -> Result<CaptureOptions> {
        let constraints = self.constraints.unwrap_or_default();
        if constraints.ideal_width == 0 || constraints.ideal_height == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "ideal resolution {}x{} must be non-zero",
                constraints.ideal_width, constraints.ideal_height
            )));
        }

        let image_format = self.image_format.unwrap_or_default();
        if let ImageFormat::Jpeg(quality) = image_format {
            if !(1..=100).contains(&quality) {
                return Err(Error::InvalidConfiguration(format!(
                    "JPEG quality {quality} is outside 1..=100"
                )));
            }
        }

        Ok(CaptureOptions {
            constraints,
            image_format,
        })
    }
}
