//! Error types for the sync layer.

use thiserror::Error;

/// A diff segment asked for more baseline than there is.
///
/// Means the receiver's baseline has diverged from the sender's.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "malformed diff: segment at baseline offset {offset} needs {requested} chars, {available} available"
)]
pub struct MalformedDiff {
    /// Char offset into the baseline where the failing segment starts.
    pub offset: usize,
    /// Chars the segment wanted to consume.
    pub requested: usize,
    /// Chars left in the baseline at `offset`.
    pub available: usize,
}

/// Errors from the transport channel.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TransportError {
    /// The channel is not in the `Open` state.
    #[error("transport is not open")]
    NotOpen,

    /// The peer end of the channel went away.
    #[error("transport channel closed")]
    ChannelClosed,

    /// Server URL cannot be turned into a socket URL.
    #[error("invalid server url `{0}`")]
    InvalidUrl(String),

    /// Connecting failed.
    #[error("failed to connect to {url}: {message}")]
    Connect { url: String, message: String },
}

/// Errors that can occur while driving a sync session.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SyncError {
    /// Received diff does not fit the local baseline.
    #[error(transparent)]
    MalformedDiff(#[from] MalformedDiff),

    /// Transport not open, or the send failed.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(TransportError),

    /// Inbound message is not a valid envelope.
    #[error("failed to decode envelope: {0}")]
    Decode(#[from] serde_json::Error),

    /// Encoding an outbound envelope failed.
    #[error("failed to encode envelope: {0}")]
    Encode(String),

    /// Could not establish the transport.
    #[error("transport error: {0}")]
    Transport(TransportError),
}

impl SyncError {
    /// Whether the session survives this error.
    ///
    /// Everything except a failed connect leaves the session usable.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SyncError::Transport(_))
    }
}
