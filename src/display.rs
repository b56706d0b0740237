//! Display sink capability.
//!
//! The supervisor emits each composed viewport to a [`DisplaySink`] and
//! polls it for a quit request once per tick. The poll is the session's
//! only quit surface: there is no key-scanning loop anywhere else, and the
//! polling cadence is deliberately tied to the render tick so the
//! supervisor stays single-threaded and lock-light.
//!
//! [`HeadlessSink`] is the built-in implementation: it counts renders, logs
//! periodically, and raises its quit flag from a deadline, a
//! [`QuitHandle`] (e.g. wired to Ctrl-C), or an explicit call.

use crate::viewport::Viewport;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Capability: the external display/preview collaborator.
#[async_trait]
pub trait DisplaySink: Send + Sync {
    /// Emit the composed viewport.
    async fn render(&self, viewport: &Viewport) -> Result<()>;

    /// Non-blocking poll for a user quit request.
    fn poll_quit_request(&self) -> bool;
}

/// Clonable handle for requesting session quit from outside the sink.
#[derive(Debug, Clone)]
pub struct QuitHandle(Arc<AtomicBool>);

impl QuitHandle {
    /// Raise the quit request.
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Display sink for unattended sessions.
///
/// Renders are counted rather than shown; a summary line is logged every
/// `log_every` renders so long captures stay observable.
pub struct HeadlessSink {
    frames: AtomicU64,
    quit: Arc<AtomicBool>,
    deadline: Option<Instant>,
    log_every: u64,
}

impl HeadlessSink {
    /// Sink with no deadline; quit comes from a [`QuitHandle`] only.
    pub fn new() -> Self {
        Self {
            frames: AtomicU64::new(0),
            quit: Arc::new(AtomicBool::new(false)),
            deadline: None,
            log_every: 100,
        }
    }

    /// Sink that raises its own quit request after `duration`.
    pub fn with_deadline(duration: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + duration),
            ..Self::new()
        }
    }

    /// Handle for raising the quit request externally (e.g. from Ctrl-C).
    pub fn quit_handle(&self) -> QuitHandle {
        QuitHandle(self.quit.clone())
    }

    /// Number of viewports rendered so far.
    pub fn frames_rendered(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }
}

impl Default for HeadlessSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DisplaySink for HeadlessSink {
    async fn render(&self, viewport: &Viewport) -> Result<()> {
        let count = self.frames.fetch_add(1, Ordering::SeqCst) + 1;
        if count % self.log_every == 0 {
            tracing::info!(
                renders = count,
                width = viewport.width(),
                height = viewport.height(),
                "viewport rendered"
            );
        }
        Ok(())
    }

    fn poll_quit_request(&self) -> bool {
        if self.quit.load(Ordering::SeqCst) {
            return true;
        }
        matches!(self.deadline, Some(deadline) if Instant::now() >= deadline)
    }
}
