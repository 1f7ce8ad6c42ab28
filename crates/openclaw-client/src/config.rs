//! Client configuration.

use crate::error::ClientError;
use crate::secret::AuthToken;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Default client id announced in the handshake.
pub const DEFAULT_CLIENT_ID: &str = "webchat-ui";

/// Default client version announced in the handshake.
pub const DEFAULT_CLIENT_VERSION: &str = "1.0.0";

/// Default platform announced in the handshake.
pub const DEFAULT_PLATFORM: &str = "web";

/// Default role requested in the handshake.
pub const DEFAULT_ROLE: &str = "operator";

/// Default per-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Gateway address used by [`ClientConfig::from_env`] when none is set.
pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:18789";

/// Environment variable names.
pub mod vars {
    /// Gateway URL (`http(s)://` is rewritten to `ws(s)://`).
    pub const OPENCLAW_GATEWAY_URL: &str = "OPENCLAW_GATEWAY_URL";

    /// Gateway auth token.
    pub const OPENCLAW_TOKEN: &str = "OPENCLAW_TOKEN";
}

/// How the client presents itself to the gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientMode {
    Webchat,
    Cli,
    #[default]
    Ui,
    Backend,
    Node,
    Probe,
    Test,
}

impl ClientMode {
    /// Wire name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webchat => "webchat",
            Self::Cli => "cli",
            Self::Ui => "ui",
            Self::Backend => "backend",
            Self::Node => "node",
            Self::Probe => "probe",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for ClientMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ClientMode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "webchat" => Ok(Self::Webchat),
            "cli" => Ok(Self::Cli),
            "ui" => Ok(Self::Ui),
            "backend" => Ok(Self::Backend),
            "node" => Ok(Self::Node),
            "probe" => Ok(Self::Probe),
            "test" => Ok(Self::Test),
            other => Err(ClientError::Config(format!("Unknown client mode: {}", other))),
        }
    }
}

/// Gateway client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// WebSocket URL of the gateway (`ws://` or `wss://`).
    pub gateway_url: String,

    /// Auth token sent in the handshake.
    #[serde(default)]
    pub token: AuthToken,

    /// Client id.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Client version.
    #[serde(default = "default_client_version")]
    pub client_version: String,

    /// Client platform.
    #[serde(default = "default_platform")]
    pub platform: String,

    /// Client mode.
    #[serde(default)]
    pub mode: ClientMode,

    /// Requested role.
    #[serde(default = "default_role")]
    pub role: String,

    /// Requested scopes.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

fn default_client_version() -> String {
    DEFAULT_CLIENT_VERSION.to_string()
}

fn default_platform() -> String {
    DEFAULT_PLATFORM.to_string()
}

fn default_role() -> String {
    DEFAULT_ROLE.to_string()
}

fn default_scopes() -> Vec<String> {
    vec![
        "operator.read".to_string(),
        "operator.write".to_string(),
        "operator.admin".to_string(),
    ]
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

impl ClientConfig {
    /// Create a configuration with defaults for every optional field.
    pub fn new(gateway_url: impl Into<String>, token: impl Into<AuthToken>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            token: token.into(),
            client_id: default_client_id(),
            client_version: default_client_version(),
            platform: default_platform(),
            mode: ClientMode::default(),
            role: default_role(),
            scopes: default_scopes(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }

    /// Build a configuration from `OPENCLAW_GATEWAY_URL` and `OPENCLAW_TOKEN`.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Empty values count as unset. An `http(s)://` URL is rewritten to
    /// `ws(s)://`, and the client identifies itself as `gateway-client`.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let url = get(vars::OPENCLAW_GATEWAY_URL).unwrap_or_else(|| DEFAULT_GATEWAY_URL.into());
        let token = get(vars::OPENCLAW_TOKEN).unwrap_or_default();

        Self::new(http_to_ws(&url), token).with_client_id("gateway-client")
    }

    /// Load a JSON5 configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ClientError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string and validate it.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            json5::from_str(content).map_err(|e| ClientError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration, collecting all problems into one error.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        match url::Url::parse(&self.gateway_url) {
            Ok(url) if url.scheme() == "ws" || url.scheme() == "wss" => {}
            Ok(url) => errors.push(format!(
                "Gateway URL must use ws:// or wss://, got {}://",
                url.scheme()
            )),
            Err(e) => errors.push(format!("Invalid gateway URL '{}': {}", self.gateway_url, e)),
        }

        if self.client_id.trim().is_empty() {
            errors.push("Client id cannot be empty".to_string());
        }

        if self.request_timeout_ms == 0 {
            errors.push("Request timeout must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ClientError::Config(errors.join("; ")))
        }
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Set the client id.
    pub fn with_client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = id.into();
        self
    }

    /// Set the client version.
    pub fn with_client_version(mut self, version: impl Into<String>) -> Self {
        self.client_version = version.into();
        self
    }

    /// Set the platform.
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Set the client mode.
    pub fn with_mode(mut self, mode: ClientMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the requested role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    /// Set the requested scopes.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }
}

/// Rewrite an `http(s)://` URL to the matching WebSocket scheme.
pub fn http_to_ws(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        url.to_string()
    }
}
