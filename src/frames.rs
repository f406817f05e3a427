//! Frame types: raw device snapshots and the encoded records handed to the
//! display layer.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use std::fmt;

use crate::{Error, Result};

/// Pixel layouts a device snapshot can arrive in (FourCC codes).
///
/// All supported layouts are 8-bit, four bytes per pixel. The `X` variants carry
/// an unused padding byte in place of alpha.
///
/// # Examples
///
/// ```
/// use camera_feed::PixelFormat;
///
/// assert_eq!(u32::from(PixelFormat::RGBA), u32::from_le_bytes(*b"RGBA"));
/// assert_eq!(PixelFormat::try_from(u32::from_le_bytes(*b"BGRX")).unwrap(), PixelFormat::BGRX);
/// ```
#[derive(Debug, TryFromPrimitive, IntoPrimitive, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u32)]
pub enum PixelFormat {
    RGBA = 0x4142_4752,
    RGBX = 0x5842_4752,
    BGRA = 0x4152_4742,
    BGRX = 0x5852_4742,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        4
    }

    /// Whether red sits in the third byte rather than the first.
    const fn is_bgr(self) -> bool {
        matches!(self, PixelFormat::BGRA | PixelFormat::BGRX)
    }
}

/// Output encoding for a frame's image URL.
///
/// # Examples
///
/// ```
/// use camera_feed::ImageFormat;
///
/// // PNG format (lossless)
/// let png = ImageFormat::Png;
///
/// // JPEG with quality 85 (lossy, smaller file size)
/// let jpeg = ImageFormat::Jpeg(85);
/// assert_eq!(jpeg.mime_type(), "image/jpeg");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG format (lossless compression)
    Png,
    /// JPEG format with quality setting (1-100, where 100 is highest quality)
    Jpeg(u8),
}

impl ImageFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg(_) => "image/jpeg",
        }
    }
}

impl Default for ImageFormat {
    /// JPEG at quality 92, what browsers use for `image/jpeg` snapshots.
    fn default() -> Self {
        ImageFormat::Jpeg(92)
    }
}

/// Device dimensions in pixels.
///
/// Displays as `"{width}x{height}"` with no padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A device still negotiating its format reports zero in either dimension.
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Fits entirely inside `other`.
    pub const fn fits_within(self, other: Resolution) -> bool {
        self.width <= other.width && self.height <= other.height
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An owned snapshot of device pixels.
#[derive(Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    /// Bytes per row, at least `width * 4`.
    pub line_stride: usize,
    pub data: Vec<u8>,
}

impl fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixel_format", &self.pixel_format)
            .field("line_stride", &self.line_stride)
            .field("data (bytes)", &self.data.len())
            .finish()
    }
}

impl VideoFrame {
    /// Wrap a tightly packed or row-padded pixel buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFrame`] if a dimension is zero, the stride is
    /// shorter than a row, or the buffer is too small for `height` rows.
    pub fn new(
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
        line_stride: usize,
        data: Vec<u8>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidFrame(format!(
                "Video frame has empty dimensions {width}x{height}"
            )));
        }

        let row_bytes = width as usize * pixel_format.bytes_per_pixel();
        if line_stride < row_bytes {
            return Err(Error::InvalidFrame(format!(
                "Line stride ({line_stride}) is shorter than a row ({row_bytes})"
            )));
        }

        let required = line_stride * (height as usize - 1) + row_bytes;
        if data.len() < required {
            return Err(Error::InvalidFrame(format!(
                "Video frame buffer holds {} bytes, {required} required",
                data.len()
            )));
        }

        Ok(Self {
            width,
            height,
            pixel_format,
            line_stride,
            data,
        })
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Bytes of one row without any trailing padding.
    fn row_bytes(&self) -> usize {
        self.width as usize * self.pixel_format.bytes_per_pixel()
    }

    fn rows(&self) -> impl Iterator<Item = &[u8]> {
        let row_bytes = self.row_bytes();
        self.data
            .chunks(self.line_stride)
            .take(self.height as usize)
            .map(move |row| &row[..row_bytes])
    }

    /// Tightly packed RGBA copy of this frame, dropping row padding.
    ///
    /// `X` formats get an opaque alpha channel.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(self.row_bytes() * self.height as usize);
        let bgr = self.pixel_format.is_bgr();
        let opaque = matches!(self.pixel_format, PixelFormat::RGBX | PixelFormat::BGRX);

        for row in self.rows() {
            for px in row.chunks_exact(4) {
                let (r, b) = if bgr { (px[2], px[0]) } else { (px[0], px[2]) };
                let a = if opaque { u8::MAX } else { px[3] };
                rgba.extend_from_slice(&[r, px[1], b, a]);
            }
        }
        rgba
    }

    /// Tightly packed RGB copy of this frame (alpha stripped).
    fn to_rgb(&self) -> Vec<u8> {
        let bgr = self.pixel_format.is_bgr();
        self.rows()
            .flat_map(|row| row.chunks_exact(4))
            .flat_map(|px| {
                if bgr {
                    [px[2], px[1], px[0]]
                } else {
                    [px[0], px[1], px[2]]
                }
            })
            .collect()
    }

    /// Encode the frame as PNG bytes.
    ///
    /// Row padding is removed and BGR layouts are swizzled to RGBA.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        use png::{BitDepth, ColorType, Encoder};

        let rgba_data = self.to_rgba();

        let mut png_data = Vec::new();
        let mut encoder = Encoder::new(&mut png_data, self.width, self.height);
        encoder.set_color(ColorType::Rgba);
        encoder.set_depth(BitDepth::Eight);

        encoder
            .write_header()
            .and_then(|mut writer| writer.write_image_data(&rgba_data))
            .map_err(|e| Error::Encoding(format!("PNG encoding failed: {e}")))?;

        Ok(png_data)
    }

    /// Encode the frame as JPEG bytes with the specified quality (1-100).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if a dimension exceeds the JPEG limit of
    /// 65535 pixels or the encoder fails.
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        use jpeg_encoder::{ColorType as JpegColorType, Encoder as JpegEncoder};

        let (width, height) = match (u16::try_from(self.width), u16::try_from(self.height)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err(Error::Encoding(format!(
                    "{}x{} exceeds the JPEG dimension limit",
                    self.width, self.height
                )))
            }
        };

        // JPEG has no alpha channel
        let rgb_data = self.to_rgb();

        let mut jpeg_data = Vec::new();
        let encoder = JpegEncoder::new(&mut jpeg_data, quality);
        encoder
            .encode(&rgb_data, width, height, JpegColorType::Rgb)
            .map_err(|e| Error::Encoding(format!("JPEG encoding failed: {e}")))?;

        Ok(jpeg_data)
    }

    /// Encode the frame as a base64 data URL, `data:image/jpeg;base64,...` or
    /// `data:image/png;base64,...`, ready for an `<img src>`.
    pub fn encode_data_url(&self, format: ImageFormat) -> Result<String> {
        use base64::{engine::general_purpose::STANDARD, Engine};

        let image_bytes = match format {
            ImageFormat::Png => self.encode_png()?,
            ImageFormat::Jpeg(quality) => self.encode_jpeg(quality)?,
        };

        let mime_type = format.mime_type();
        let base64_data = STANDARD.encode(&image_bytes);
        Ok(format!("data:{mime_type};base64,{base64_data}"))
    }
}

/// Per-frame statistics shown next to the image.
///
/// `processing_time_ms` is a synthetic figure; nothing is processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameStats {
    fps: u32,
    resolution: Resolution,
    processing_time_ms: u32,
    timestamp_ms: i64,
}

impl FrameStats {
    pub fn new(
        fps: u32,
        resolution: Resolution,
        processing_time_ms: u32,
        timestamp_ms: i64,
    ) -> Self {
        Self {
            fps,
            resolution,
            processing_time_ms,
            timestamp_ms,
        }
    }

    /// Target rate in effect when the frame was captured.
    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn processing_time_ms(&self) -> u32 {
        self.processing_time_ms
    }

    /// Capture time in milliseconds since the Unix epoch.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }
}

/// One sampled frame: its encoded image and its statistics.
///
/// Immutable once built. Cloning shares the encoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameData {
    image_url: std::rc::Rc<str>,
    stats: FrameStats,
}

impl FrameData {
    pub fn new(image_url: impl Into<std::rc::Rc<str>>, stats: FrameStats) -> Self {
        Self {
            image_url: image_url.into(),
            stats,
        }
    }

    /// Encoded image, typically a data URL.
    pub fn image_url(&self) -> &str {
        &self.image_url
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }
}
