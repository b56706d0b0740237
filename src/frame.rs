//! Image frame primitives shared by sources, workers, and the viewport.
//!
//! Frames carry unsigned 8-bit samples with interleaved channels. A source
//! negotiates its [`FrameShape`] once at open time and every frame it
//! produces afterwards keeps that shape for the session's duration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pixel layout of a frame's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Single 8-bit luminance channel.
    Mono8,
    /// Interleaved 8-bit blue/green/red channels.
    Bgr8,
}

impl PixelFormat {
    /// Number of interleaved channels per pixel.
    pub fn channels(&self) -> u32 {
        match self {
            PixelFormat::Mono8 => 1,
            PixelFormat::Bgr8 => 3,
        }
    }

    /// Short lowercase name, matching the configuration spelling.
    pub fn name(&self) -> &'static str {
        match self {
            PixelFormat::Mono8 => "mono8",
            PixelFormat::Bgr8 => "bgr8",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mono8" => Ok(PixelFormat::Mono8),
            "bgr8" => Ok(PixelFormat::Bgr8),
            other => Err(format!(
                "unknown pixel format '{other}' (expected mono8 or bgr8)"
            )),
        }
    }
}

/// Negotiated frame geometry, fixed per source for a session's duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameShape {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Sample layout.
    pub format: PixelFormat,
}

impl FrameShape {
    /// Byte length of a frame with this geometry.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.channels() as usize
    }
}

impl fmt::Display for FrameShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.format)
    }
}

/// A single image frame.
///
/// Data is stored as a raw byte vector with row-major, interleaved-channel
/// layout (1 byte per sample).
#[derive(Debug, Clone)]
pub struct Frame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Sample layout.
    pub format: PixelFormat,
    /// Raw pixel data.
    pub data: Vec<u8>,
}

impl Frame {
    /// Create a frame from raw bytes with an explicit format.
    ///
    /// The caller must ensure the buffer length matches the shape.
    pub fn from_bytes(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            data,
        }
    }

    /// Create a single-channel frame from 8-bit luminance data.
    pub fn mono8(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self::from_bytes(width, height, PixelFormat::Mono8, data)
    }

    /// This frame's geometry.
    pub fn shape(&self) -> FrameShape {
        FrameShape {
            width: self.width,
            height: self.height,
            format: self.format,
        }
    }

    /// Sample value at (x, y, channel), or `None` if out of bounds.
    pub fn get(&self, x: u32, y: u32, channel: u32) -> Option<u8> {
        let channels = self.format.channels();
        if x >= self.width || y >= self.height || channel >= channels {
            return None;
        }
        let idx = ((y * self.width + x) * channels + channel) as usize;
        self.data.get(idx).copied()
    }
}

/// Convert a frame to the target pixel format.
///
/// A pure function with fixed output shape per input shape: width and height
/// are preserved, only the channel layout changes. Identity conversions are
/// free.
///
/// Mono to BGR replicates the luminance sample into all three channels; BGR
/// to mono uses the BT.601 integer luma approximation.
pub fn convert(frame: Frame, target: PixelFormat) -> Frame {
    if frame.format == target {
        return frame;
    }
    match (frame.format, target) {
        (PixelFormat::Mono8, PixelFormat::Bgr8) => {
            let mut data = Vec::with_capacity(frame.data.len() * 3);
            for &sample in &frame.data {
                data.extend_from_slice(&[sample, sample, sample]);
            }
            Frame::from_bytes(frame.width, frame.height, PixelFormat::Bgr8, data)
        }
        (PixelFormat::Bgr8, PixelFormat::Mono8) => {
            let mut data = Vec::with_capacity(frame.data.len() / 3);
            for bgr in frame.data.chunks_exact(3) {
                // Y = 0.299 R + 0.587 G + 0.114 B, in fixed point.
                let luma =
                    (77 * u32::from(bgr[2]) + 150 * u32::from(bgr[1]) + 29 * u32::from(bgr[0]) + 128)
                        >> 8;
                data.push(luma.min(255) as u8);
            }
            Frame::from_bytes(frame.width, frame.height, PixelFormat::Mono8, data)
        }
        // Identity pairs are handled by the early return above.
        _ => frame,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_byte_len() {
        let shape = FrameShape {
            width: 640,
            height: 480,
            format: PixelFormat::Bgr8,
        };
        assert_eq!(shape.byte_len(), 640 * 480 * 3);
    }

    #[test]
    fn test_pixel_format_parse() {
        assert_eq!("bgr8".parse::<PixelFormat>().unwrap(), PixelFormat::Bgr8);
        assert_eq!("MONO8".parse::<PixelFormat>().unwrap(), PixelFormat::Mono8);
        assert!("rgb48".parse::<PixelFormat>().is_err());
    }

    #[test]
    fn test_get_bounds() {
        let frame = Frame::mono8(2, 2, vec![10, 20, 30, 40]);
        assert_eq!(frame.get(1, 1, 0), Some(40));
        assert_eq!(frame.get(2, 0, 0), None);
        assert_eq!(frame.get(0, 0, 1), None);
    }

    #[test]
    fn test_convert_identity_is_free() {
        let frame = Frame::mono8(2, 1, vec![1, 2]);
        let out = convert(frame, PixelFormat::Mono8);
        assert_eq!(out.data, vec![1, 2]);
    }

    #[test]
    fn test_convert_mono_to_bgr_replicates() {
        let frame = Frame::mono8(2, 1, vec![7, 9]);
        let out = convert(frame, PixelFormat::Bgr8);
        assert_eq!(out.format, PixelFormat::Bgr8);
        assert_eq!(out.data, vec![7, 7, 7, 9, 9, 9]);
    }

    #[test]
    fn test_convert_bgr_to_mono_luma() {
        // Pure green: Y should be dominated by the 0.587 weight.
        let frame = Frame::from_bytes(1, 1, PixelFormat::Bgr8, vec![0, 255, 0]);
        let out = convert(frame, PixelFormat::Mono8);
        assert_eq!(out.data.len(), 1);
        let y = out.data[0];
        assert!((140..=160).contains(&y), "unexpected luma {y}");
    }
}
