//! Unified error type for the server crate.

/// Top-level error for the accept loop and connection handlers.
///
/// Domain and codec failures never reach this type: the gateway
/// reports every `GameError` back to the offending client as a wire
/// `Error` event, and undecodable frames are logged and skipped
/// without dropping the connection.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Socket-level failure (bind, accept).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// WebSocket handshake or framing failure.
    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
