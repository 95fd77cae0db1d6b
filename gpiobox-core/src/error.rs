//! Domain-specific error types for the GPIO box.
//!
//! All fallible operations return `Result<T, BoxError>`.
//! Transport and framing errors never leave the stream client; they are
//! logged and turned into state transitions there.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the GPIO box.
#[derive(Debug, Error)]
pub enum BoxError {
    // ── Transport Errors ─────────────────────────────────────────
    /// The TCP/IO layer reported an error (refused, reset, closed).
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The WebSocket layer failed during connect or while streaming.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    // ── Framing Errors ───────────────────────────────────────────
    /// Received text that does not form a valid frame.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A frame arrived that is not valid in the current phase, or a
    /// frame could not be built with the given fields.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    // ── Control Errors ───────────────────────────────────────────
    /// An operator asked for a restart. Not a failure.
    #[error("restart requested")]
    FatalRestart,

    /// Configuration could not be read or applied.
    #[error("config error: {0}")]
    Config(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

impl BoxError {
    /// Whether this error should send the client back through the
    /// reconnection policy.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            BoxError::Transport(_)
                | BoxError::WebSocket(_)
                | BoxError::ChannelClosed
                | BoxError::Timeout(_)
        )
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for BoxError {
    fn from(s: String) -> Self {
        BoxError::Other(s)
    }
}

impl From<&str> for BoxError {
    fn from(s: &str) -> Self {
        BoxError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for BoxError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        BoxError::ChannelClosed
    }
}

impl From<serde_json::Error> for BoxError {
    fn from(e: serde_json::Error) -> Self {
        BoxError::MalformedFrame(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for BoxError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        BoxError::WebSocket(e.to_string())
    }
}
