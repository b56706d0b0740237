//! Frame-source capabilities.
//!
//! This module defines the seam between the capture engine and whatever
//! actually produces frames (a vendor camera SDK, a simulated device, a test
//! probe). Two traits carry the whole contract:
//!
//! - [`SourceProvider`] is the bus/SDK side: enumerate attached devices,
//!   validate opaque per-source settings, and open a configured source.
//! - [`FrameSource`] is one opened device: start, acquire with a bounded
//!   timeout, stop, close.
//!
//! # Design Philosophy
//!
//! Each trait:
//! - Is async (uses #[async_trait])
//! - Uses anyhow::Result for errors; the worker boundary adds the source
//!   index and maps into the session taxonomy
//! - Focuses on ONE thing
//!
//! A `FrameSource` is owned exclusively by its worker, so its operations
//! take `&mut self`; the provider is shared and takes `&self`. Blocking
//! vendor calls are expected to be confined inside implementations (e.g.
//! via `tokio::task::spawn_blocking`), never exposed to callers.

pub mod pattern;

use crate::frame::{Frame, FrameShape};
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Identifies one capture device and its configuration.
///
/// The settings payload is opaque to the engine: only the provider that
/// opens the source interprets it. Immutable for the worker's lifetime.
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    /// Vendor/bus index of the device.
    pub index: u32,
    /// Provider-interpreted capture settings.
    pub settings: toml::Value,
}

impl SourceDescriptor {
    /// Descriptor with explicit settings.
    pub fn new(index: u32, settings: toml::Value) -> Self {
        Self { index, settings }
    }

    /// Descriptor with empty settings (provider defaults apply).
    pub fn bare(index: u32) -> Self {
        Self {
            index,
            settings: toml::Value::Table(toml::map::Map::new()),
        }
    }
}

/// One row of a provider enumeration: a connected device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    /// Bus index usable in a [`SourceDescriptor`].
    pub index: u32,
    /// Device serial (or simulated equivalent).
    pub serial: String,
}

/// Capability: one opened capture device.
///
/// # Contract
/// - `shape` is fixed once the source is open; every frame the source
///   produces has exactly this geometry.
/// - `acquire` suspends at most `timeout`; `Ok(None)` means the interval
///   elapsed without a frame and the caller should simply poll again.
/// - `stop` and `close` are best-effort from the caller's perspective:
///   workers log and swallow their errors during teardown.
#[async_trait]
pub trait FrameSource: Send {
    /// Negotiated frame geometry.
    fn shape(&self) -> FrameShape;

    /// Begin streaming frames.
    async fn start(&mut self) -> Result<()>;

    /// Wait (bounded by `timeout`) for the next frame.
    async fn acquire(&mut self, timeout: Duration) -> Result<Option<Frame>>;

    /// Halt streaming. The source may be restarted afterwards.
    async fn stop(&mut self) -> Result<()>;

    /// Release the device. The source must not be used afterwards.
    async fn close(&mut self) -> Result<()>;
}

/// Capability: the bus/SDK that devices hang off.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Provider type name used in configuration and diagnostics.
    fn provider_type(&self) -> &'static str;

    /// List connected devices.
    async fn enumerate(&self) -> Result<Vec<SourceInfo>>;

    /// Validate per-source settings without opening the device.
    ///
    /// Called for early feedback before workers are spawned; `open` performs
    /// the same checks again as part of configuration.
    fn validate(&self, settings: &toml::Value) -> Result<()>;

    /// Open and configure the device identified by `descriptor`.
    async fn open(&self, descriptor: &SourceDescriptor) -> Result<Box<dyn FrameSource>>;
}
