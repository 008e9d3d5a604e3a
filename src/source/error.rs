//! Source and ingestion error types

use std::time::Duration;

use thiserror::Error;

/// Failure reported by a source client while dialing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Connection or handshake did not complete in time
    #[error("Dial timed out after {0:?}")]
    Timeout(Duration),

    /// Source address could not be reached
    #[error("Source unreachable: {0}")]
    Unreachable(String),

    /// Source answered but the protocol handshake failed
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Source address is malformed or uses an unsupported scheme
    #[error("Invalid source address: {0}")]
    InvalidAddress(String),
}

/// Why an ingestion worker stopped
///
/// Recorded as the stream's last error. None of these are fatal to the
/// process; they only drive the restart-or-dormant decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExitReason {
    /// Source unreachable or handshake failed
    #[error("Stream dial failed: {0}")]
    DialFailure(#[from] SourceError),

    /// Connected but no keyframe within the watchdog window
    #[error("Stream exit: no video on stream")]
    NoVideo,

    /// Source signaled termination mid-stream
    #[error("Stream exit: source disconnected")]
    Disconnected,

    /// On-demand stream idle past its viewer timeout
    #[error("Stream exit: on-demand stream has no viewers")]
    NoViewer,
}
