//! Custom error types for the capture session.
//!
//! This module defines the primary error type, [`SessionError`], for the
//! whole engine. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the failures a capture session can encounter,
//! from configuration problems to source initialization and mid-stream
//! acquisition faults.
//!
//! ## Propagation policy
//!
//! Worker-side errors are captured locally into the worker's error slot and
//! never cross the task boundary as panics. The supervisor is the only place
//! a session-level error propagates from, and only after every worker has
//! been confirmed stopped. Shutdown-grace expiry is deliberately *not* an
//! error: the straggler is aborted, the event is logged, and the count is
//! reported in the session summary.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the session error type.
pub type AppResult<T> = std::result::Result<T, SessionError>;

/// Primary error type for a capture session.
///
/// Every variant that originates from one source carries the identifying
/// source index, so the caller's terminal outcome always names the device
/// that failed.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Configuration file loading or parsing failed.
    ///
    /// Wraps `figment::Error` from the configuration layer. Permanent:
    /// requires fixing the configuration file or environment overrides.
    #[error("configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Configuration parsed but is semantically unusable.
    ///
    /// Examples: an empty source list, a zero frame dimension.
    #[error("invalid session: {0}")]
    Invalid(String),

    /// A source failed to open or configure.
    ///
    /// Fatal to the whole session (fail-fast): surfaced through the worker's
    /// error slot once the supervisor's readiness wait expires.
    #[error("source {index} failed to initialize: {err}")]
    Init {
        /// Index of the source that failed.
        index: u32,
        /// Underlying provider error.
        err: anyhow::Error,
    },

    /// A source's acquire or stream-start call failed during the capture
    /// loop.
    ///
    /// Fatal to that worker, which exits; the supervisor detects the death
    /// via its liveness check and treats it as session-fatal (no per-source
    /// restart).
    #[error("source {index} acquisition failed: {err}")]
    Acquisition {
        /// Index of the source that failed.
        index: u32,
        /// Underlying source error.
        err: anyhow::Error,
    },

    /// Composing or emitting the viewport failed.
    ///
    /// Propagates to the supervisor's caller after the stop/join/abort
    /// shutdown path has run.
    #[error("viewport render failed: {err}")]
    Render {
        /// Underlying compose/sink error.
        err: anyhow::Error,
    },

    /// Not every worker reached the readiness barrier in time and none of
    /// them recorded a concrete initialization error.
    ///
    /// `pending` lists the sources whose workers had not finished
    /// initialization when the wait expired.
    #[error("sources failed to become ready within {timeout:?} (pending: {pending:?})")]
    ReadyTimeout {
        /// The bounded wait that expired.
        timeout: Duration,
        /// Source indices that never signalled ready.
        pending: Vec<u32>,
    },

    /// A worker task ended without recording an error.
    ///
    /// Diagnostic of last resort; the liveness check caught the death but
    /// the error slot was empty (e.g. the task panicked before reaching the
    /// capture loop's error handling).
    #[error("worker for source {index} exited unexpectedly")]
    WorkerPanic {
        /// Index of the source whose worker died.
        index: u32,
    },
}

impl SessionError {
    /// The source index this error identifies, if it is per-source.
    pub fn source_index(&self) -> Option<u32> {
        match self {
            SessionError::Init { index, .. }
            | SessionError::Acquisition { index, .. }
            | SessionError::WorkerPanic { index } => Some(*index),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_source() {
        let err = SessionError::Init {
            index: 1,
            err: anyhow::anyhow!("no such device"),
        };
        assert_eq!(
            err.to_string(),
            "source 1 failed to initialize: no such device"
        );
        assert_eq!(err.source_index(), Some(1));
    }

    #[test]
    fn test_ready_timeout_lists_pending() {
        let err = SessionError::ReadyTimeout {
            timeout: Duration::from_secs(5),
            pending: vec![0, 2],
        };
        assert!(err.to_string().contains("[0, 2]"));
        assert_eq!(err.source_index(), None);
    }
}
