//! Handshake payloads for the `connect` method.

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::secret::AuthToken;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version this client speaks. Both ends of the negotiated range.
pub const PROTOCOL_VERSION: u32 = 3;

/// Method name of the handshake request.
pub const CONNECT_METHOD: &str = "connect";

/// Payload `type` of a successful handshake.
pub const HELLO_OK_TYPE: &str = "hello-ok";

/// Client identity announced during the handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub id: String,
    pub version: String,
    pub platform: String,
    pub mode: String,
}

/// Credentials presented during the handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectAuth {
    pub token: AuthToken,
}

/// Parameters of the `connect` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub min_protocol: u32,
    pub max_protocol: u32,
    pub client: ClientIdentity,
    pub role: String,
    pub scopes: Vec<String>,
    pub auth: ConnectAuth,
}

impl ConnectParams {
    /// Build handshake parameters from a client configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            min_protocol: PROTOCOL_VERSION,
            max_protocol: PROTOCOL_VERSION,
            client: ClientIdentity {
                id: config.client_id.clone(),
                version: config.client_version.clone(),
                platform: config.platform.clone(),
                mode: config.mode.as_str().to_string(),
            },
            role: config.role.clone(),
            scopes: config.scopes.clone(),
            auth: ConnectAuth {
                token: config.token.clone(),
            },
        }
    }
}

/// Server identity from `hello-ok`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Connection id assigned by the gateway.
    pub conn_id: String,
}

/// Methods and events the gateway advertises.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Features {
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub events: Vec<String>,
}

/// Transport limits the gateway enforces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub max_payload: u64,
    pub max_buffered_bytes: u64,
    pub tick_interval_ms: u64,
}

/// Device credentials issued on connect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloAuth {
    pub device_token: String,
    pub role: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at_ms: Option<u64>,
}

/// Successful handshake payload.
///
/// `snapshot` is kept opaque; its shape belongs to the gateway schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloOk {
    #[serde(rename = "type")]
    pub kind: String,
    pub protocol: u32,
    pub server: ServerInfo,
    #[serde(default)]
    pub features: Features,
    #[serde(default)]
    pub snapshot: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas_host_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<HelloAuth>,
    #[serde(default)]
    pub policy: Policy,
}

impl HelloOk {
    /// Parse a `connect` response payload, requiring `type: "hello-ok"`.
    pub fn from_payload(payload: Value) -> Result<Self, ClientError> {
        let hello: Self = serde_json::from_value(payload)
            .map_err(|e| ClientError::Decode(format!("invalid hello payload: {}", e)))?;

        if hello.kind != HELLO_OK_TYPE {
            return Err(ClientError::Decode(format!(
                "unexpected handshake payload type: {}",
                hello.kind
            )));
        }
        Ok(hello)
    }

    /// Whether the gateway advertises a method.
    pub fn supports_method(&self, method: &str) -> bool {
        self.features.methods.iter().any(|m| m == method)
    }

    /// Whether the gateway advertises an event.
    pub fn supports_event(&self, event: &str) -> bool {
        self.features.events.iter().any(|e| e == event)
    }
}
