//! Session supervisor: the single consumer and orchestrator.
//!
//! The supervisor spawns one worker per configured source, waits for all of
//! them at the readiness barrier (bounded), latches the Start signal, then
//! runs the tick loop: poll each worker's liveness and frame slot in fixed
//! spawn order, blit received frames into the tiled viewport, emit it to
//! the display sink, and poll the sink for a quit request. Any failure
//! (a dead worker, a compose/render error, a readiness timeout) latches
//! Stop and drives the same two-phase shutdown: join each worker within a
//! grace period, forcibly abort the rest.
//!
//! There is no per-source recovery. A source failure is terminal for the
//! whole session, and the caller receives exactly one outcome once every
//! worker is confirmed stopped.

use crate::display::DisplaySink;
use crate::error::{AppResult, SessionError};
use crate::frame::{FrameShape, PixelFormat};
use crate::source::{SourceDescriptor, SourceProvider};
use crate::sync::Signal;
use crate::viewport::Viewport;
use crate::worker::{self, WorkerContext, WorkerHandle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;
use tokio::time::timeout;

/// Session-level tuning knobs.
///
/// Durations deserialize from humantime strings ("5s", "250ms").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Negotiated frame width every source must produce.
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,

    /// Negotiated frame height every source must produce.
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,

    /// Pixel format frames are converted to for display.
    #[serde(default = "default_display_format")]
    pub display_format: PixelFormat,

    /// Bound on the readiness barrier wait.
    #[serde(default = "default_ready_timeout", with = "humantime_serde")]
    pub ready_timeout: Duration,

    /// Grace period for each worker to exit after Stop, before abort.
    #[serde(default = "default_join_grace", with = "humantime_serde")]
    pub join_grace: Duration,

    /// Bound on each worker's acquire call.
    #[serde(default = "default_acquire_timeout", with = "humantime_serde")]
    pub acquire_timeout: Duration,

    /// Pacing of the supervisor's render tick.
    #[serde(default = "default_tick_interval", with = "humantime_serde")]
    pub tick_interval: Duration,
}

fn default_frame_width() -> u32 {
    640
}
fn default_frame_height() -> u32 {
    480
}
fn default_display_format() -> PixelFormat {
    PixelFormat::Bgr8
}
fn default_ready_timeout() -> Duration {
    Duration::from_secs(5)
}
fn default_join_grace() -> Duration {
    Duration::from_secs(3)
}
fn default_acquire_timeout() -> Duration {
    Duration::from_millis(250)
}
fn default_tick_interval() -> Duration {
    Duration::from_millis(10)
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
            display_format: default_display_format(),
            ready_timeout: default_ready_timeout(),
            join_grace: default_join_grace(),
            acquire_timeout: default_acquire_timeout(),
            tick_interval: default_tick_interval(),
        }
    }
}

/// Supervisor lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, nothing spawned yet.
    Created,
    /// Workers spawned, waiting at the readiness barrier.
    AwaitingReady,
    /// Start latched, tick loop running.
    Running,
    /// Stop latched, joining/aborting workers.
    Stopping,
    /// All workers confirmed stopped.
    Done,
}

/// Per-source outcome counters.
#[derive(Debug, Clone)]
pub struct SourceStats {
    /// Source index.
    pub index: u32,
    /// Frames blitted into this source's tile.
    pub frames: u64,
}

/// Terminal outcome of a successful session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// Render ticks completed.
    pub ticks: u64,
    /// Per-source frame counts, in tile order.
    pub sources: Vec<SourceStats>,
    /// Workers that had to be forcibly aborted during shutdown.
    pub forced_stops: u32,
}

/// Orchestrates one capture session from spawn to confirmed shutdown.
pub struct Supervisor {
    config: SessionConfig,
    state: SessionState,
}

impl Supervisor {
    /// Supervisor in the `Created` state.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Created,
        }
    }

    /// Current lifecycle phase.
    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(from = ?self.state, to = ?next, "session state");
        self.state = next;
    }

    /// Run a session over `descriptors`, returning once the session reaches
    /// `Done`.
    ///
    /// The result is the session's single terminal outcome: a summary on
    /// user-requested quit, or the first captured error (identifying the
    /// failing source) after every worker has been joined or aborted.
    pub async fn run(
        &mut self,
        provider: Arc<dyn SourceProvider>,
        descriptors: Vec<SourceDescriptor>,
        sink: Arc<dyn DisplaySink>,
    ) -> AppResult<SessionSummary> {
        if descriptors.is_empty() {
            return Err(SessionError::Invalid("no sources configured".into()));
        }
        if self.config.frame_width == 0 || self.config.frame_height == 0 {
            return Err(SessionError::Invalid(
                "frame dimensions must be non-zero".into(),
            ));
        }
        for descriptor in &descriptors {
            provider
                .validate(&descriptor.settings)
                .map_err(|err| SessionError::Init {
                    index: descriptor.index,
                    err,
                })?;
        }

        let n = descriptors.len();
        let tile_shape = FrameShape {
            width: self.config.frame_width,
            height: self.config.frame_height,
            format: self.config.display_format,
        };
        let mut viewport = Viewport::new(n as u32, tile_shape);
        tracing::info!(
            sources = n,
            rows = viewport.layout().rows,
            cols = viewport.layout().cols,
            tile = %tile_shape,
            "session starting"
        );

        let barrier = Arc::new(Barrier::new(n + 1));
        let start = Signal::new();
        let stop = Signal::new();

        let mut workers: Vec<WorkerHandle> = descriptors
            .into_iter()
            .map(|descriptor| {
                worker::spawn(WorkerContext {
                    index: descriptor.index,
                    provider: provider.clone(),
                    descriptor,
                    display_format: self.config.display_format,
                    acquire_timeout: self.config.acquire_timeout,
                    barrier: barrier.clone(),
                    start: start.clone(),
                    stop: stop.clone(),
                })
            })
            .collect();
        self.transition(SessionState::AwaitingReady);

        if timeout(self.config.ready_timeout, barrier.wait())
            .await
            .is_err()
        {
            tracing::error!(
                timeout = ?self.config.ready_timeout,
                "sources failed to become ready"
            );
            self.transition(SessionState::Stopping);
            // Stop first, then Start, so workers parked at either wait are
            // released before the join pass.
            stop.set();
            start.set();
            shutdown(&mut workers, self.config.join_grace).await;
            self.transition(SessionState::Done);
            return Err(readiness_failure(&mut workers, self.config.ready_timeout));
        }

        self.transition(SessionState::Running);
        start.set();
        tracing::info!("capture running");

        let mut ticks: u64 = 0;
        let mut frames_per = vec![0u64; n];
        let mut failure: Option<SessionError> = None;

        'tick: loop {
            for (position, handle) in workers.iter_mut().enumerate() {
                // Liveness first: a dead worker is session-fatal.
                if handle.is_finished() {
                    let err = handle
                        .try_take_error()
                        .unwrap_or(SessionError::WorkerPanic {
                            index: handle.index(),
                        });
                    tracing::error!(index = handle.index(), %err, "worker died, stopping session");
                    failure = Some(err);
                    break 'tick;
                }

                if let Some(frame) = handle.try_recv_frame() {
                    if let Err(err) = viewport.blit(position as u32, &frame) {
                        failure = Some(SessionError::Render { err });
                        break 'tick;
                    }
                    frames_per[position] += 1;
                }
            }

            if let Err(err) = sink.render(&viewport).await {
                failure = Some(SessionError::Render { err });
                break;
            }
            ticks += 1;

            if sink.poll_quit_request() {
                tracing::info!(ticks, "quit requested");
                break;
            }

            tokio::time::sleep(self.config.tick_interval).await;
        }

        self.transition(SessionState::Stopping);
        stop.set();
        let forced = shutdown(&mut workers, self.config.join_grace).await;
        self.transition(SessionState::Done);

        match failure {
            Some(err) => Err(err),
            None => Ok(SessionSummary {
                ticks,
                sources: workers
                    .iter()
                    .zip(frames_per)
                    .map(|(handle, frames)| SourceStats {
                        index: handle.index(),
                        frames,
                    })
                    .collect(),
                forced_stops: forced,
            }),
        }
    }
}

/// Two-phase worker shutdown: bounded join, then abort.
///
/// Returns the number of workers that had to be aborted. Mandatory even for
/// cooperative stops: a worker may be parked inside a vendor call that does
/// not observe Stop promptly.
async fn shutdown(workers: &mut [WorkerHandle], grace: Duration) -> u32 {
    let mut forced = 0;
    for handle in workers.iter_mut() {
        if !handle.join_within(grace).await {
            tracing::warn!(
                index = handle.index(),
                grace = ?grace,
                "worker did not stop within grace period, aborting"
            );
            handle.abort();
            forced += 1;
        }
    }
    tracing::debug!(forced, "all workers stopped");
    forced
}

/// Build the terminal error for a readiness timeout.
///
/// Prefers a concrete initialization error recorded by a dead worker; falls
/// back to naming the sources that never signalled ready.
fn readiness_failure(workers: &mut [WorkerHandle], ready_timeout: Duration) -> SessionError {
    let mut pending = Vec::new();
    let mut first_error = None;
    for handle in workers.iter_mut() {
        if let Some(err) = handle.try_take_error() {
            tracing::error!(index = handle.index(), %err, "source failed during readiness");
            if first_error.is_none() {
                first_error = Some(err);
            }
        } else if !handle.is_ready() {
            pending.push(handle.index());
        }
    }
    first_error.unwrap_or(SessionError::ReadyTimeout {
        timeout: ready_timeout,
        pending,
    })
}
