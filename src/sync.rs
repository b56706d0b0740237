//! Coordination primitives for a capture session.
//!
//! Two small building blocks live here:
//!
//! - [`Signal`]: a monotonic one-shot latch (false to true, never reset)
//!   backed by a `tokio::sync::watch` channel, used for the session's Start
//!   and Stop broadcasts. The watch channel supplies the memory-visibility
//!   guarantee a plain shared boolean would lack.
//! - [`frame_slot`]: a single-producer/single-consumer mailbox of depth 1.
//!   The producer pushes without blocking; a push while the slot still holds
//!   an undelivered frame is a no-op drop (the undelivered frame is kept).
//!   The consumer polls without blocking.

use crate::frame::Frame;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// One-shot broadcast latch.
///
/// Clones share the same underlying state. `set` is sticky: once true the
/// signal stays true for the session's lifetime.
#[derive(Debug, Clone)]
pub struct Signal {
    tx: Arc<watch::Sender<bool>>,
}

impl Signal {
    /// Create an unset signal.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Latch the signal. Idempotent.
    pub fn set(&self) {
        self.tx.send_replace(true);
    }

    /// Non-blocking read of the current state.
    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    /// Suspend until the signal is set. Returns immediately if already set.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as any Signal clone, so this cannot fail
        // while a waiter still holds one.
        let _ = rx.wait_for(|set| *set).await;
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a connected frame-slot pair.
pub fn frame_slot() -> (FrameSender, FrameReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (FrameSender { tx }, FrameReceiver { rx })
}

/// Producer half of a depth-1 frame mailbox.
#[derive(Debug)]
pub struct FrameSender {
    tx: mpsc::Sender<Frame>,
}

impl FrameSender {
    /// Push a frame without blocking.
    ///
    /// Returns `true` if the frame was delivered into the slot. If the slot
    /// still holds an undelivered frame, that frame is kept, the new frame
    /// is dropped, and `false` is returned. A closed slot (consumer gone,
    /// session shutting down) also returns `false`.
    pub fn push(&self, frame: Frame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => false,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// Consumer half of a depth-1 frame mailbox.
#[derive(Debug)]
pub struct FrameReceiver {
    rx: mpsc::Receiver<Frame>,
}

impl FrameReceiver {
    /// Non-blocking poll for the pending frame, if any.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }
}
