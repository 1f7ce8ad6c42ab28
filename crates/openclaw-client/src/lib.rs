//! # openclaw-client
//!
//! WebSocket client for the OpenClaw gateway protocol.
//!
//! One connection carries many concurrent request/response exchanges and an
//! independent stream of server-pushed events:
//!
//! - **Frames**: `req`/`res`/`event` JSON text frames
//! - **Handshake**: the `connect` request negotiating protocol and identity
//! - **Requests**: id correlation with per-request timeouts
//! - **Events**: fan-out to registered listeners with failure isolation
//! - **Session**: [`GatewayClient`] composing all of the above

pub mod client;
pub mod config;
pub mod connection;
pub mod correlator;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod managed;
pub mod methods;
pub mod protocol;
pub mod secret;

pub use client::GatewayClient;
pub use config::{ClientConfig, ClientMode};
pub use connection::ConnectionState;
pub use dispatcher::ListenerHandle;
pub use error::{ClientError, RemoteError};
pub use frame::{EventFrame, RequestFrame, ResponseFrame, StateVersion};
pub use managed::ManagedClient;
pub use protocol::HelloOk;
pub use secret::AuthToken;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
