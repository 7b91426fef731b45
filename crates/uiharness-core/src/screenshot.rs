//! Screenshot pipeline: raw frame → RGB24 → PNG

use crate::error::HarnessError;
use crate::host::{FrameState, UiHost};
use image::{ImageFormat, RgbImage};
use std::io::Cursor;

/// Size of the synthetic placeholder frame
pub const PLACEHOLDER_WIDTH: u32 = 480;
pub const PLACEHOLDER_HEIGHT: u32 = 480;

/// In-memory layout of one source pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 32-bit `0xAARRGGBB` stored little-endian, i.e. bytes `[B, G, R, A]`
    Argb8888,
    /// Bytes `[R, G, B, A]`
    Rgba8888,
    /// Bytes `[R, G, B]`
    Rgb888,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Argb8888 | Self::Rgba8888 => 4,
            Self::Rgb888 => 3,
        }
    }

    fn rgb(&self, px: &[u8]) -> [u8; 3] {
        match self {
            Self::Argb8888 => [px[2], px[1], px[0]],
            Self::Rgba8888 | Self::Rgb888 => [px[0], px[1], px[2]],
        }
    }
}

/// A rendered frame as handed over by the UI host
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// Bytes per row, at least `width * bytes_per_pixel`
    pub stride: usize,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl RawFrame {
    /// Tightly packed frame
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: width as usize * format.bytes_per_pixel(),
            format,
            data,
        }
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }
}

/// Where a screenshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSource {
    Display,
    Placeholder,
}

/// An encoded screenshot
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
    pub source: CaptureSource,
}

/// Outcome of one capture attempt
#[derive(Debug)]
pub enum Capture {
    Ready(Screenshot),
    /// The host has not produced a frame yet
    Pending,
}

fn rgb24_len(width: u32, height: u32) -> Result<usize, HarnessError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(3))
        .ok_or_else(|| HarnessError::Memory(format!("RGB buffer for {}x{} frame", width, height)))
}

/// Convert a frame to packed RGB24
///
/// Every source offset is checked against the buffer; pixels that fall
/// outside it are written as black.
pub fn to_rgb24(frame: &RawFrame) -> Result<Vec<u8>, HarnessError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(HarnessError::Screenshot(format!(
            "empty frame {}x{}",
            frame.width, frame.height
        )));
    }
    let bpp = frame.format.bytes_per_pixel();
    let row_bytes = (frame.width as usize)
        .checked_mul(bpp)
        .ok_or_else(|| HarnessError::Memory("frame row".into()))?;
    if frame.stride < row_bytes {
        return Err(HarnessError::Screenshot(format!(
            "stride {} shorter than row of {} bytes",
            frame.stride, row_bytes
        )));
    }

    let mut out = vec![0u8; rgb24_len(frame.width, frame.height)?];
    let mut out_of_range = 0usize;
    for (y, row) in out.chunks_exact_mut(frame.width as usize * 3).enumerate() {
        let row_start = y.checked_mul(frame.stride);
        for (x, dst) in row.chunks_exact_mut(3).enumerate() {
            let src = row_start
                .and_then(|start| start.checked_add(x * bpp))
                .and_then(|offset| {
                    offset
                        .checked_add(bpp)
                        .and_then(|end| frame.data.get(offset..end))
                });
            match src {
                Some(px) => dst.copy_from_slice(&frame.format.rgb(px)),
                None => out_of_range += 1,
            }
        }
    }

    if out_of_range > 0 {
        tracing::warn!(
            "{} pixels outside the {}-byte frame buffer were filled black",
            out_of_range,
            frame.data.len()
        );
    }
    Ok(out)
}

/// Encode a packed RGB24 buffer as PNG
pub fn encode_png(width: u32, height: u32, rgb: Vec<u8>) -> Result<Vec<u8>, HarnessError> {
    let img = RgbImage::from_raw(width, height, rgb).ok_or_else(|| {
        HarnessError::Screenshot(format!("RGB buffer does not match {}x{}", width, height))
    })?;
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| HarnessError::Screenshot(format!("Failed to encode PNG: {}", e)))?;
    Ok(buf)
}

/// Deterministic gradient used when no display can be captured
///
/// Red follows x, green follows y, blue follows x + y.
pub fn placeholder_rgb24(width: u32, height: u32) -> Result<Vec<u8>, HarnessError> {
    let mut out = vec![0u8; rgb24_len(width, height)?];
    let (w, h) = (u64::from(width.max(1)), u64::from(height.max(1)));
    for (i, px) in out.chunks_exact_mut(3).enumerate() {
        let x = i as u64 % w;
        let y = i as u64 / w;
        px[0] = (x * 255 / w) as u8;
        px[1] = (y * 255 / h) as u8;
        px[2] = ((x + y) * 255 / (w + h)) as u8;
    }
    Ok(out)
}

/// Turns host frames into PNG screenshots
#[derive(Debug, Clone)]
pub struct ScreenshotPipeline {
    placeholder: bool,
}

impl ScreenshotPipeline {
    pub fn new(placeholder: bool) -> Self {
        Self { placeholder }
    }

    /// Start a fresh capture on the host and try to take it
    pub fn begin<H: UiHost>(&self, host: &mut H) -> Result<Capture, HarnessError> {
        host.begin_capture();
        self.poll(host)
    }

    /// Try again after [`Capture::Pending`]
    pub fn poll<H: UiHost>(&self, host: &mut H) -> Result<Capture, HarnessError> {
        match host.snapshot()? {
            FrameState::Ready(frame) => {
                let rgb = to_rgb24(&frame)?;
                let png = encode_png(frame.width, frame.height, rgb)?;
                tracing::debug!(
                    "Captured {}x{} frame, {} PNG bytes",
                    frame.width,
                    frame.height,
                    png.len()
                );
                Ok(Capture::Ready(Screenshot {
                    width: frame.width,
                    height: frame.height,
                    png,
                    source: CaptureSource::Display,
                }))
            }
            FrameState::Pending => Ok(Capture::Pending),
            FrameState::Unavailable if self.placeholder => {
                tracing::warn!("No display frame available, serving placeholder image");
                self.placeholder().map(Capture::Ready)
            }
            FrameState::Unavailable => Err(HarnessError::Screenshot(
                "UI host cannot capture frames".into(),
            )),
        }
    }

    fn placeholder(&self) -> Result<Screenshot, HarnessError> {
        let rgb = placeholder_rgb24(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT)?;
        Ok(Screenshot {
            width: PLACEHOLDER_WIDTH,
            height: PLACEHOLDER_HEIGHT,
            png: encode_png(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT, rgb)?,
            source: CaptureSource::Placeholder,
        })
    }
}
