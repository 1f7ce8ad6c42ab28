//! Client error types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error object carried by a failed response frame.
///
/// Fields are kept exactly as the gateway sent them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteError {
    /// Machine-readable error code (e.g. `E_DENIED`).
    pub code: String,

    /// Human-readable message.
    pub message: String,

    /// Additional structured details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Whether the gateway considers the request safe to retry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,

    /// Suggested delay before retrying.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl RemoteError {
    /// Create a remote error with a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: None,
            retry_after_ms: None,
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for RemoteError {}

/// Errors surfaced by the gateway client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The underlying WebSocket failed to open or broke.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The `connect` handshake was rejected or timed out.
    #[error("Handshake failed: {0}")]
    HandshakeFailed(#[source] Box<ClientError>),

    /// `connect` was called on an open session.
    #[error("Already connected")]
    AlreadyConnected,

    /// A request was issued without an open transport.
    #[error("Not connected")]
    NotConnected,

    /// No response arrived before the request deadline.
    #[error("Request timeout: {method} (after {timeout_ms}ms)")]
    RequestTimeout { method: String, timeout_ms: u64 },

    /// The session was torn down while the request was pending.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The gateway answered with an error frame.
    #[error("Remote error: {0}")]
    Remote(RemoteError),

    /// An inbound frame could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Request parameters or a payload could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid client configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Error code: the gateway's code for remote errors, a stable local code otherwise.
    pub fn code(&self) -> &str {
        match self {
            Self::Remote(e) => &e.code,
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::HandshakeFailed(_) => "HANDSHAKE_FAILED",
            Self::AlreadyConnected => "ALREADY_CONNECTED",
            Self::NotConnected => "NOT_CONNECTED",
            Self::RequestTimeout { .. } => "REQUEST_TIMEOUT",
            Self::ConnectionClosed => "CONNECTION_CLOSED",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// The remote error, if the gateway produced this failure.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote(e) => Some(e),
            Self::HandshakeFailed(inner) => inner.remote(),
            _ => None,
        }
    }

    /// Whether the gateway flagged the failed request as retryable.
    pub fn is_retryable(&self) -> bool {
        self.remote().and_then(|e| e.retryable).unwrap_or(false)
    }

    /// Retry delay suggested by the gateway.
    pub fn retry_after(&self) -> Option<Duration> {
        self.remote()
            .and_then(|e| e.retry_after_ms)
            .map(Duration::from_millis)
    }
}

impl From<RemoteError> for ClientError {
    fn from(err: RemoteError) -> Self {
        Self::Remote(err)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
