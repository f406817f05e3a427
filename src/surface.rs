//! Off-screen decode surface.
//!
//! Each tick draws the device image into the surface at native resolution and
//! encodes the surface to an image URL.

use crate::{
    frames::{ImageFormat, PixelFormat, Resolution, VideoFrame},
    Error, Result,
};

/// Hidden RGBA surface the current device image is drawn into.
///
/// The surface adopts the size of whatever it last drew, like a canvas resized
/// to the video element before `drawImage`.
#[derive(Debug, Default)]
pub struct DecodeSurface {
    canvas: Option<VideoFrame>,
}

impl DecodeSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current size, zero before the first draw and after [`clear`](Self::clear).
    pub fn resolution(&self) -> Resolution {
        self.canvas
            .as_ref()
            .map(VideoFrame::resolution)
            .unwrap_or_default()
    }

    /// Resize to the snapshot's native resolution and copy its pixels in.
    pub fn draw(&mut self, snapshot: &VideoFrame) -> Result<()> {
        let rgba = snapshot.to_rgba();
        let line_stride = snapshot.width as usize * PixelFormat::RGBA.bytes_per_pixel();

        match self.canvas.as_mut() {
            Some(canvas) if canvas.resolution() == snapshot.resolution() => {
                canvas.data = rgba;
            }
            _ => {
                self.canvas = Some(VideoFrame::new(
                    snapshot.width,
                    snapshot.height,
                    PixelFormat::RGBA,
                    line_stride,
                    rgba,
                )?);
            }
        }
        Ok(())
    }

    /// Encode the surface contents as a data URL.
    pub fn encode(&self, format: ImageFormat) -> Result<String> {
        self.canvas
            .as_ref()
            .ok_or_else(|| Error::InvalidFrame("Nothing has been drawn to the surface".into()))?
            .encode_data_url(format)
    }

    /// Drop the pixel buffer.
    pub fn clear(&mut self) {
        self.canvas = None;
    }
}
