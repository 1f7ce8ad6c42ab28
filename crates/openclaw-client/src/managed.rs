//! Connection management for short-lived and long-lived callers.

use crate::client::GatewayClient;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Creates gateway clients from one configuration.
///
/// Use [`with_client`](Self::with_client) for a scoped connection, or
/// [`client`](Self::client) to share one persistent connection.
pub struct ManagedClient {
    config: ClientConfig,
    persistent: Mutex<Option<Arc<GatewayClient>>>,
}

impl ManagedClient {
    /// Create a manager for the given configuration.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            persistent: Mutex::new(None),
        }
    }

    /// Create a manager configured from `OPENCLAW_GATEWAY_URL` and
    /// `OPENCLAW_TOKEN`.
    pub fn from_env() -> Self {
        Self::new(ClientConfig::from_env())
    }

    /// Configuration used for new clients.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connect a fresh client, run `f` with it and disconnect.
    ///
    /// The client is disconnected whether `f` succeeds or fails.
    pub async fn with_client<F, Fut, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(Arc<GatewayClient>) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<ClientError>,
    {
        let client = Arc::new(GatewayClient::new(self.config.clone()));
        if let Err(e) = client.connect().await {
            client.disconnect();
            return Err(e.into());
        }

        let result = f(client.clone()).await;
        client.disconnect();
        result
    }

    /// Shared persistent client, connecting a new one when none is live.
    pub async fn client(&self) -> Result<Arc<GatewayClient>> {
        let mut slot = self.persistent.lock().await;

        if let Some(client) = slot.as_ref() {
            if client.is_connected() {
                return Ok(client.clone());
            }
            debug!("Persistent gateway client is no longer connected; replacing it");
        }

        *slot = None;
        let client = Arc::new(GatewayClient::new(self.config.clone()));
        client.connect().await?;
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Disconnect and forget the persistent client.
    pub async fn disconnect(&self) {
        if let Some(client) = self.persistent.lock().await.take() {
            client.disconnect();
        }
    }

    /// Whether a connected persistent client exists.
    pub async fn is_connected(&self) -> bool {
        self.persistent
            .lock()
            .await
            .as_ref()
            .map(|c| c.is_connected())
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for ManagedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedClient")
            .field("gateway_url", &self.config.gateway_url)
            .finish()
    }
}
