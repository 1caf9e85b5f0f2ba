//! Error types for the relay hub
//!
//! Defines the crate-level error enum.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Relay-level errors
///
/// Covers the fatal failure classes of a connection: transport handshake
/// or I/O failures and envelope codec failures. Per-message problems
/// (malformed frames, full queues, unknown peers) are handled locally
/// where they occur and never surface through this type.
#[derive(Debug, Error)]
pub enum RelayError {
    /// WebSocket protocol or handshake error (fatal to the connection)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Envelope encode/decode error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
