//! Per-source capture worker.
//!
//! A worker is a plain async function spawned onto the runtime (composition,
//! not a subclassed execution unit). It owns one [`FrameSource`] end to end
//! and walks a fixed phase sequence:
//!
//! 1. **Initialize**: ask the provider to open the source. On failure the
//!    error goes into the error slot and the task exits *without* reaching
//!    the barrier, so the supervisor's bounded readiness wait expires.
//! 2. **Signal-ready**: wait at the readiness barrier (raced against Stop
//!    so a failed session can still unpark the worker).
//! 3. **Wait-for-start**: suspend until the Start signal latches.
//! 4. **Capture loop**: acquire, convert to the display format, push into
//!    the depth-1 frame slot; a push while the slot is full drops the new
//!    frame. Exits when Stop is observed.
//! 5. **Teardown**: stop and close the source, best-effort.
//!
//! Errors never cross the task boundary as panics: the first one is
//! captured into the error slot (a oneshot, so first-write-wins by
//! construction) and the task simply ends. The supervisor notices through
//! its liveness check.

use crate::error::SessionError;
use crate::frame::{convert, Frame, PixelFormat};
use crate::source::{FrameSource, SourceDescriptor, SourceProvider};
use crate::sync::{frame_slot, FrameReceiver, FrameSender, Signal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Barrier};
use tokio::task::JoinHandle;

/// Warn about dropped frames at this cadence, not on every drop.
const DROP_WARN_EVERY: u64 = 100;

/// Everything a worker needs to run one source.
pub(crate) struct WorkerContext {
    /// Source index, for diagnostics and error attribution.
    pub index: u32,
    /// The bus/SDK that opens the source.
    pub provider: Arc<dyn SourceProvider>,
    /// Device identity and opaque settings.
    pub descriptor: SourceDescriptor,
    /// Pixel format frames are converted to before publishing.
    pub display_format: PixelFormat,
    /// Bound on each acquire call.
    pub acquire_timeout: Duration,
    /// Readiness rendezvous shared with the supervisor.
    pub barrier: Arc<Barrier>,
    /// Session start latch.
    pub start: Signal,
    /// Session stop latch.
    pub stop: Signal,
}

/// Supervisor-side handle to one spawned worker.
///
/// The handle owns the worker's lifecycle (join/abort) and the consumer
/// ends of its frame and error slots; the task itself exclusively owns the
/// frame source.
pub struct WorkerHandle {
    index: u32,
    join: JoinHandle<()>,
    frames: FrameReceiver,
    error: oneshot::Receiver<SessionError>,
    ready: Arc<AtomicBool>,
}

impl WorkerHandle {
    /// Source index this worker drives.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Did this worker finish initialization and reach the barrier?
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Liveness check: has the task exited (normally or not)?
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Non-blocking poll of the frame slot.
    pub fn try_recv_frame(&mut self) -> Option<Frame> {
        self.frames.try_recv()
    }

    /// Drain the error slot, if the worker recorded a failure.
    pub fn try_take_error(&mut self) -> Option<SessionError> {
        self.error.try_recv().ok()
    }

    /// Wait up to `grace` for the task to exit. Returns `false` on timeout.
    pub async fn join_within(&mut self, grace: Duration) -> bool {
        tokio::time::timeout(grace, &mut self.join).await.is_ok()
    }

    /// Forcibly terminate the task. Used after the join grace expires.
    pub fn abort(&self) {
        self.join.abort();
    }
}

/// Spawn a worker for one source descriptor.
pub(crate) fn spawn(ctx: WorkerContext) -> WorkerHandle {
    let index = ctx.index;
    let (frame_tx, frame_rx) = frame_slot();
    let (err_tx, err_rx) = oneshot::channel();
    let ready = Arc::new(AtomicBool::new(false));
    let ready_flag = ready.clone();

    let join = tokio::spawn(async move {
        if let Err(err) = run(ctx, frame_tx, ready_flag).await {
            tracing::debug!(index, %err, "worker exiting on error");
            // The supervisor may already be gone during shutdown races.
            let _ = err_tx.send(err);
        }
    });

    WorkerHandle {
        index,
        join,
        frames: frame_rx,
        error: err_rx,
        ready,
    }
}

async fn run(
    ctx: WorkerContext,
    frames: FrameSender,
    ready: Arc<AtomicBool>,
) -> Result<(), SessionError> {
    let index = ctx.index;

    // Initialize. A failure here means the barrier is never reached.
    let mut source = ctx
        .provider
        .open(&ctx.descriptor)
        .await
        .map_err(|err| SessionError::Init { index, err })?;
    tracing::debug!(index, shape = %source.shape(), "source opened");

    // Signal-ready. Stop can unpark us if another source failed.
    ready.store(true, Ordering::SeqCst);
    tokio::select! {
        _ = ctx.barrier.wait() => {}
        _ = ctx.stop.wait() => {
            teardown(index, source.as_mut()).await;
            return Ok(());
        }
    }

    // Wait-for-start.
    tokio::select! {
        _ = ctx.start.wait() => {}
        _ = ctx.stop.wait() => {
            teardown(index, source.as_mut()).await;
            return Ok(());
        }
    }

    let result = capture_loop(&ctx, source.as_mut(), &frames).await;
    teardown(index, source.as_mut()).await;
    result
}

async fn capture_loop(
    ctx: &WorkerContext,
    source: &mut dyn FrameSource,
    frames: &FrameSender,
) -> Result<(), SessionError> {
    let index = ctx.index;

    source
        .start()
        .await
        .map_err(|err| SessionError::Acquisition { index, err })?;
    tracing::debug!(index, "capture started");

    let mut delivered: u64 = 0;
    let mut dropped: u64 = 0;

    while !ctx.stop.is_set() {
        match source.acquire(ctx.acquire_timeout).await {
            Ok(Some(raw)) => {
                let frame = convert(raw, ctx.display_format);
                if frames.push(frame) {
                    delivered += 1;
                } else {
                    dropped += 1;
                    if dropped % DROP_WARN_EVERY == 0 {
                        tracing::warn!(index, dropped, "display slot full, dropping frames");
                    }
                }
            }
            // Acquire interval elapsed without a frame; poll again.
            Ok(None) => {}
            Err(err) => return Err(SessionError::Acquisition { index, err }),
        }
    }

    tracing::debug!(index, delivered, dropped, "capture loop stopped");
    Ok(())
}

/// Best-effort source shutdown. Close errors are logged, never propagated.
async fn teardown(index: u32, source: &mut dyn FrameSource) {
    if let Err(err) = source.stop().await {
        tracing::debug!(index, %err, "source stop failed during teardown");
    }
    if let Err(err) = source.close().await {
        tracing::debug!(index, %err, "source close failed during teardown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;
    use crate::source::pattern::PatternProvider;
    use crate::source::SourceDescriptor;

    fn context(
        provider: Arc<dyn SourceProvider>,
        descriptor: SourceDescriptor,
        parties: usize,
    ) -> (WorkerContext, Signal, Signal, Arc<Barrier>) {
        let start = Signal::new();
        let stop = Signal::new();
        let barrier = Arc::new(Barrier::new(parties));
        let ctx = WorkerContext {
            index: descriptor.index,
            provider,
            descriptor,
            display_format: PixelFormat::Mono8,
            acquire_timeout: Duration::from_millis(50),
            barrier: barrier.clone(),
            start: start.clone(),
            stop: stop.clone(),
        };
        (ctx, start, stop, barrier)
    }

    fn fast_descriptor(index: u32) -> SourceDescriptor {
        let mut table = toml::map::Map::new();
        table.insert("width".into(), toml::Value::Integer(8));
        table.insert("height".into(), toml::Value::Integer(8));
        table.insert("frame_rate".into(), toml::Value::Float(500.0));
        SourceDescriptor::new(index, toml::Value::Table(table))
    }

    #[tokio::test]
    async fn test_worker_publishes_frames_after_start() {
        let provider = Arc::new(PatternProvider::new(1));
        let (ctx, start, stop, barrier) = context(provider, fast_descriptor(0), 2);
        let mut handle = spawn(ctx);

        barrier.wait().await;
        start.set();

        // Give the worker a few frame intervals.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let frame = handle.try_recv_frame();
        assert!(frame.is_some(), "expected a published frame");

        stop.set();
        assert!(handle.join_within(Duration::from_secs(1)).await);
        assert!(handle.try_take_error().is_none());
    }

    #[tokio::test]
    async fn test_worker_records_init_error_and_skips_barrier() {
        let provider = Arc::new(PatternProvider::new(1));
        let mut table = toml::map::Map::new();
        table.insert("fail_open".into(), toml::Value::Boolean(true));
        let descriptor = SourceDescriptor::new(0, toml::Value::Table(table));

        // Barrier parties = 2 but the worker must never arrive.
        let (ctx, _start, _stop, _barrier) = context(provider, descriptor, 2);
        let mut handle = spawn(ctx);

        assert!(handle.join_within(Duration::from_secs(1)).await);
        let err = handle.try_take_error().unwrap();
        assert!(matches!(err, SessionError::Init { index: 0, .. }));
    }

    #[tokio::test]
    async fn test_stop_unparks_worker_waiting_for_start() {
        let provider = Arc::new(PatternProvider::new(1));
        let (ctx, _start, stop, barrier) = context(provider, fast_descriptor(0), 2);
        let mut handle = spawn(ctx);

        barrier.wait().await;
        // Never set start; stop alone must release the worker cleanly.
        stop.set();
        assert!(handle.join_within(Duration::from_secs(1)).await);
        assert!(handle.try_take_error().is_none());
    }

    #[tokio::test]
    async fn test_worker_records_acquisition_error() {
        let provider = Arc::new(PatternProvider::new(1));
        let mut table = toml::map::Map::new();
        table.insert("width".into(), toml::Value::Integer(8));
        table.insert("height".into(), toml::Value::Integer(8));
        table.insert("frame_rate".into(), toml::Value::Float(500.0));
        table.insert("fail_after_frames".into(), toml::Value::Integer(1));
        let descriptor = SourceDescriptor::new(0, toml::Value::Table(table));

        let (ctx, start, _stop, barrier) = context(provider, descriptor, 2);
        let mut handle = spawn(ctx);

        barrier.wait().await;
        start.set();

        assert!(handle.join_within(Duration::from_secs(1)).await);
        let err = handle.try_take_error().unwrap();
        assert!(matches!(err, SessionError::Acquisition { index: 0, .. }));
    }
}
