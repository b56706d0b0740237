//! Simulated test-pattern source.
//!
//! Stands in for a vendor camera SDK so the engine can be exercised without
//! hardware. Each simulated device produces an animated 8-bit diagnostic
//! pattern (checkerboard background, gradient bars, an orbiting hotspot,
//! frame-number dots) at a configurable geometry and rate.
//!
//! Failure injection is part of the contract: `fail_open` makes `open`
//! fail, `fail_after_frames` makes acquisition fail mid-stream. Both exist
//! so every supervisor error path can be driven from tests.

use crate::frame::{convert, Frame, FrameShape, PixelFormat};
use crate::source::{FrameSource, SourceDescriptor, SourceInfo, SourceProvider};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;

/// Configuration for one simulated source.
#[derive(Debug, Clone, Deserialize)]
pub struct PatternConfig {
    /// Frame width in pixels (default: 640)
    #[serde(default = "default_width")]
    pub width: u32,

    /// Frame height in pixels (default: 480)
    #[serde(default = "default_height")]
    pub height: u32,

    /// Frames per second (default: 30.0)
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,

    /// Native sample layout (default: mono8)
    #[serde(default = "default_format")]
    pub format: PixelFormat,

    /// Simulate an open/configure failure.
    #[serde(default)]
    pub fail_open: bool,

    /// Simulate an acquisition failure after this many frames.
    #[serde(default)]
    pub fail_after_frames: Option<u64>,
}

fn default_width() -> u32 {
    640
}
fn default_height() -> u32 {
    480
}
fn default_frame_rate() -> f64 {
    30.0
}
fn default_format() -> PixelFormat {
    PixelFormat::Mono8
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            frame_rate: default_frame_rate(),
            format: default_format(),
            fail_open: false,
            fail_after_frames: None,
        }
    }
}

impl PatternConfig {
    fn parse(settings: &toml::Value) -> Result<Self> {
        let cfg: PatternConfig = settings.clone().try_into()?;
        if cfg.width == 0 || cfg.height == 0 {
            bail!("pattern resolution must be non-zero");
        }
        if cfg.frame_rate <= 0.0 {
            bail!("pattern frame rate must be positive");
        }
        Ok(cfg)
    }
}

/// A simulated bus with a fixed number of attached pattern devices.
pub struct PatternProvider {
    count: u32,
}

impl PatternProvider {
    /// A bus with `count` simulated devices at indices `0..count`.
    pub fn new(count: u32) -> Self {
        Self { count }
    }
}

#[async_trait]
impl SourceProvider for PatternProvider {
    fn provider_type(&self) -> &'static str {
        "pattern"
    }

    async fn enumerate(&self) -> Result<Vec<SourceInfo>> {
        Ok((0..self.count)
            .map(|index| SourceInfo {
                index,
                serial: format!("SIM{:07}", 4_100_000 + index),
            })
            .collect())
    }

    fn validate(&self, settings: &toml::Value) -> Result<()> {
        PatternConfig::parse(settings).map(|_| ())
    }

    async fn open(&self, descriptor: &SourceDescriptor) -> Result<Box<dyn FrameSource>> {
        if descriptor.index >= self.count {
            bail!(
                "no source at index {} (bus has {})",
                descriptor.index,
                self.count
            );
        }
        let config = PatternConfig::parse(&descriptor.settings)?;
        if config.fail_open {
            return Err(anyhow!("simulated open failure"));
        }
        Ok(Box::new(PatternSource::new(descriptor.index, config)))
    }
}

/// One opened simulated device.
pub struct PatternSource {
    index: u32,
    config: PatternConfig,
    interval: Duration,
    streaming: bool,
    frame_num: u64,
}

impl PatternSource {
    fn new(index: u32, config: PatternConfig) -> Self {
        let interval = Duration::from_secs_f64(1.0 / config.frame_rate);
        Self {
            index,
            config,
            interval,
            streaming: false,
            frame_num: 0,
        }
    }
}

#[async_trait]
impl FrameSource for PatternSource {
    fn shape(&self) -> FrameShape {
        FrameShape {
            width: self.config.width,
            height: self.config.height,
            format: self.config.format,
        }
    }

    async fn start(&mut self) -> Result<()> {
        if self.streaming {
            bail!("already streaming");
        }
        self.streaming = true;
        Ok(())
    }

    async fn acquire(&mut self, timeout: Duration) -> Result<Option<Frame>> {
        if !self.streaming {
            bail!("capture has not been started");
        }
        if let Some(limit) = self.config.fail_after_frames {
            if self.frame_num >= limit {
                return Err(anyhow!("simulated acquisition failure at frame {limit}"));
            }
        }
        // Pace to the configured rate; if the caller's timeout is shorter
        // than the frame interval, report an empty interval instead.
        if self.interval > timeout {
            sleep(timeout).await;
            return Ok(None);
        }
        sleep(self.interval).await;
        self.frame_num += 1;
        let mono = generate_test_pattern(
            self.config.width,
            self.config.height,
            self.frame_num,
            self.index,
        );
        let frame = Frame::mono8(self.config.width, self.config.height, mono);
        Ok(Some(convert(frame, self.config.format)))
    }

    async fn stop(&mut self) -> Result<()> {
        self.streaming = false;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.streaming = false;
        Ok(())
    }
}

/// Simple pseudo-random number generator (LCG) for reproducible noise.
#[inline]
fn prng(seed: u64) -> u64 {
    seed.wrapping_mul(1103515245).wrapping_add(12345) & 0x7fffffff
}

/// Generates an animated diagnostic pattern for one simulated device.
///
/// The pattern includes:
/// - Checkerboard background with per-frame noise for pixel-level motion
/// - Gradient bars along the top and bottom edges
/// - A bright hotspot orbiting the center (phase-shifted per device so
///   tiles in a multi-source viewport are distinguishable)
/// - The low 4 bits of the frame number encoded as dots near the origin
///
/// # Arguments
/// * `width` - Frame width in pixels
/// * `height` - Frame height in pixels
/// * `frame_num` - Frame number (for animation/identification)
/// * `device` - Device index (for per-device phase offset)
pub fn generate_test_pattern(width: u32, height: u32, frame_num: u64, device: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let mut buffer = vec![0u8; w * h];

    let checker = (width.min(height) / 16).max(1) as usize;
    let gradient_rows = (h / 10).max(1);

    // Hotspot orbit, phase-shifted per device.
    let cx = w as f64 / 2.0;
    let cy = h as f64 / 2.0;
    let orbit = (width.min(height) as f64) / 4.0;
    let angle = frame_num as f64 * 0.1 + f64::from(device) * 1.7;
    let hx = cx + orbit * angle.cos();
    let hy = cy + orbit * angle.sin();
    let sigma = (width.min(height) as f64 / 10.0).max(2.0);

    let frame_seed = frame_num
        .wrapping_mul(2654435761)
        .wrapping_add(u64::from(device));

    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;

            // Checkerboard base at ~25% / ~30% intensity with small noise.
            let base: i32 = if ((x / checker) + (y / checker)) % 2 == 0 {
                64
            } else {
                76
            };
            let noise = ((prng(frame_seed ^ idx as u64) & 0xF) as i32) - 8;
            let mut value = (base + noise).clamp(0, 255) as u8;

            // Gradient bars: left-to-right on top, reversed on bottom.
            if y < gradient_rows {
                value = ((x * 255) / w.max(1)) as u8;
            } else if y >= h - gradient_rows {
                value = (((w - 1 - x) * 255) / w.max(1)) as u8;
            }

            // Orbiting hotspot, additive falloff.
            let dx = x as f64 - hx;
            let dy = y as f64 - hy;
            let falloff = (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp();
            value = (u32::from(value) + (falloff * 160.0) as u32).min(255) as u8;

            buffer[idx] = value;
        }
    }

    // Frame-number dots: low 4 bits along the top-left, below the gradient.
    let dot = (checker / 2).max(1);
    let dot_y = gradient_rows + dot;
    for bit in 0..4usize {
        let dot_x = dot + bit * 3 * dot;
        if dot_y + dot >= h || dot_x + dot >= w {
            break;
        }
        let on = (frame_num >> bit) & 1 == 1;
        for y in dot_y..dot_y + dot {
            for x in dot_x..dot_x + dot {
                buffer[y * w + x] = if on { 255 } else { 16 };
            }
        }
    }

    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(entries: &[(&str, toml::Value)]) -> toml::Value {
        let mut table = toml::map::Map::new();
        for (key, value) in entries {
            table.insert((*key).to_string(), value.clone());
        }
        toml::Value::Table(table)
    }

    #[tokio::test]
    async fn test_enumerate_lists_all_devices() {
        let provider = PatternProvider::new(3);
        let infos = provider.enumerate().await.unwrap();
        assert_eq!(infos.len(), 3);
        assert_eq!(infos[0].index, 0);
        assert_eq!(infos[2].serial, "SIM4100002");
    }

    #[tokio::test]
    async fn test_open_rejects_unknown_index() {
        let provider = PatternProvider::new(1);
        let result = provider.open(&SourceDescriptor::bare(5)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_open_honors_fail_open() {
        let provider = PatternProvider::new(1);
        let descriptor =
            SourceDescriptor::new(0, settings(&[("fail_open", toml::Value::Boolean(true))]));
        let err = match provider.open(&descriptor).await {
            Ok(_) => panic!("expected open to fail"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("simulated open failure"));
    }

    #[test]
    fn test_validate_rejects_zero_resolution() {
        let provider = PatternProvider::new(1);
        let bad = settings(&[("width", toml::Value::Integer(0))]);
        assert!(provider.validate(&bad).is_err());
        assert!(provider.validate(&settings(&[])).is_ok());
    }

    #[tokio::test]
    async fn test_acquire_requires_start() {
        let provider = PatternProvider::new(1);
        let mut source = provider.open(&SourceDescriptor::bare(0)).await.unwrap();
        let result = source.acquire(Duration::from_millis(10)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_acquire_produces_configured_shape() {
        let provider = PatternProvider::new(1);
        let descriptor = SourceDescriptor::new(
            0,
            settings(&[
                ("width", toml::Value::Integer(32)),
                ("height", toml::Value::Integer(24)),
                ("frame_rate", toml::Value::Float(500.0)),
                ("format", toml::Value::String("bgr8".into())),
            ]),
        );
        let mut source = provider.open(&descriptor).await.unwrap();
        source.start().await.unwrap();
        let frame = source
            .acquire(Duration::from_millis(100))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame.shape(), source.shape());
        assert_eq!(frame.data.len(), 32 * 24 * 3);
    }

    #[tokio::test]
    async fn test_acquire_times_out_without_frame() {
        let provider = PatternProvider::new(1);
        let descriptor =
            SourceDescriptor::new(0, settings(&[("frame_rate", toml::Value::Float(1.0))]));
        let mut source = provider.open(&descriptor).await.unwrap();
        source.start().await.unwrap();
        // 1 fps source polled with a 5ms timeout: no frame this interval.
        let got = source.acquire(Duration::from_millis(5)).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_fail_after_frames_trips_mid_stream() {
        let provider = PatternProvider::new(1);
        let descriptor = SourceDescriptor::new(
            0,
            settings(&[
                ("frame_rate", toml::Value::Float(1000.0)),
                ("fail_after_frames", toml::Value::Integer(2)),
            ]),
        );
        let mut source = provider.open(&descriptor).await.unwrap();
        source.start().await.unwrap();
        let timeout = Duration::from_millis(50);
        assert!(source.acquire(timeout).await.unwrap().is_some());
        assert!(source.acquire(timeout).await.unwrap().is_some());
        assert!(source.acquire(timeout).await.is_err());
    }

    #[test]
    fn test_pattern_varies_with_frame_number_and_device() {
        let a = generate_test_pattern(64, 48, 1, 0);
        let b = generate_test_pattern(64, 48, 2, 0);
        let c = generate_test_pattern(64, 48, 1, 1);
        assert_eq!(a.len(), 64 * 48);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
