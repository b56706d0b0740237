//! # Multicam Core Library
//!
//! This crate is the core library for the `multicam` application: a
//! multi-producer/single-consumer capture engine that drives N independent
//! frame sources in parallel, fans their frames into one supervisor, and
//! composes a tiled live viewport for a display sink. The vendor capture
//! SDK sits behind capability traits, so the engine runs identically over
//! real hardware bindings and the built-in simulated test-pattern bus.
//!
//! ## Crate Structure
//!
//! - **`config`**: Strongly-typed application configuration loaded through
//!   figment (TOML file plus environment overrides).
//! - **`display`**: The `DisplaySink` capability and the built-in headless
//!   sink used for unattended sessions.
//! - **`error`**: The `SessionError` taxonomy; every per-source failure
//!   carries the identifying source index.
//! - **`frame`**: Frame buffers, pixel formats, and the pure conversion
//!   function workers apply before publishing.
//! - **`logging`**: Tracing subscriber setup shared by the binary and
//!   long-running embedders.
//! - **`source`**: The `FrameSource`/`SourceProvider` capability traits and
//!   the simulated test-pattern provider.
//! - **`supervisor`**: The session orchestrator: spawn, readiness barrier,
//!   start dispatch, tick loop, and two-phase shutdown.
//! - **`sync`**: The session's coordination primitives: one-shot signal
//!   latches and the depth-1 frame mailbox.
//! - **`viewport`**: Grid layout math and in-place tile composition.
//! - **`worker`**: The per-source capture task and its supervisor-side
//!   handle.
//!
//! ## Session lifecycle
//!
//! `CREATED -> AWAITING_READY -> RUNNING -> STOPPING -> DONE`. The
//! supervisor's caller gets back exactly one terminal outcome (a summary
//! on user-requested quit, or the first captured error) after every
//! worker has been joined or forcibly stopped.

pub mod config;
pub mod display;
pub mod error;
pub mod frame;
pub mod logging;
pub mod source;
pub mod supervisor;
pub mod sync;
pub mod viewport;
pub mod worker;

pub use config::AppConfig;
pub use display::{DisplaySink, HeadlessSink, QuitHandle};
pub use error::{AppResult, SessionError};
pub use frame::{convert, Frame, FrameShape, PixelFormat};
pub use source::pattern::{PatternConfig, PatternProvider};
pub use source::{FrameSource, SourceDescriptor, SourceInfo, SourceProvider};
pub use supervisor::{SessionConfig, SessionState, SessionSummary, SourceStats, Supervisor};
pub use sync::Signal;
pub use viewport::{GridLayout, Viewport};
pub use worker::WorkerHandle;
