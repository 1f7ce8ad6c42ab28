//! Session facade over the gateway connection.

use crate::config::ClientConfig;
use crate::connection::{Connection, ConnectionState, FrameHandler};
use crate::correlator::{RequestCorrelator, ResponseHandle};
use crate::dispatcher::{EventDispatcher, ListenerHandle};
use crate::error::ClientError;
use crate::frame::{self, EventFrame, RequestFrame, ResponseFrame};
use crate::protocol::{ConnectParams, HelloOk, CONNECT_METHOD};
use crate::Result;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Routes inbound frames to the correlator and the dispatcher.
struct InboundRouter {
    correlator: Arc<RequestCorrelator>,
    dispatcher: Arc<EventDispatcher>,
}

impl FrameHandler for InboundRouter {
    fn on_response(&self, frame: ResponseFrame) {
        self.correlator.resolve(frame);
    }

    fn on_event(&self, frame: EventFrame) {
        self.dispatcher.dispatch(&frame);
    }
}

/// Client for one gateway session.
///
/// Multiplexes concurrent requests and the gateway's event stream over a
/// single WebSocket. Requests are correlated by id, so responses may arrive
/// in any order. Listeners stay registered across reconnects.
///
/// ```no_run
/// use openclaw_client::{ClientConfig, GatewayClient};
///
/// # async fn demo() -> openclaw_client::Result<()> {
/// let client = GatewayClient::new(ClientConfig::new("ws://localhost:18789", "token"));
/// let hello = client.connect().await?;
/// println!("connected as {}", hello.server.conn_id);
///
/// let agents = client.list_agents(serde_json::json!({})).await?;
/// println!("{}", agents);
///
/// client.disconnect();
/// # Ok(())
/// # }
/// ```
pub struct GatewayClient {
    config: ClientConfig,
    connection: Connection,
    correlator: Arc<RequestCorrelator>,
    dispatcher: Arc<EventDispatcher>,
    hello: RwLock<Option<HelloOk>>,
}

impl GatewayClient {
    /// Create a disconnected client.
    pub fn new(config: ClientConfig) -> Self {
        let correlator = Arc::new(RequestCorrelator::new(config.request_timeout()));
        Self {
            config,
            connection: Connection::new(),
            correlator,
            dispatcher: Arc::new(EventDispatcher::new()),
            hello: RwLock::new(None),
        }
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Open the WebSocket and perform the `connect` handshake.
    ///
    /// Dropping the returned future before it completes abandons the
    /// attempt: the socket is closed and the client can connect again.
    pub async fn connect(&self) -> Result<HelloOk> {
        self.config.validate()?;
        let mut attempt = ConnectAttempt {
            client: self,
            token: self.connection.begin_connect()?,
            handshake_id: None,
            armed: true,
        };

        info!("Connecting to gateway at {}", self.config.gateway_url);

        let router = Arc::new(InboundRouter {
            correlator: self.correlator.clone(),
            dispatcher: self.dispatcher.clone(),
        });
        self.connection
            .open_transport(&self.config.gateway_url, router)
            .await?;

        let hello = match self.handshake(&mut attempt).await {
            Ok(hello) => hello,
            Err(e) => {
                warn!("Gateway handshake failed: {}", e);
                return Err(ClientError::HandshakeFailed(Box::new(e)));
            }
        };

        if !self.connection.mark_open(hello.server.conn_id.clone()) {
            return Err(ClientError::HandshakeFailed(Box::new(
                ClientError::ConnectionClosed,
            )));
        }
        attempt.armed = false;
        *self.hello.write() = Some(hello.clone());

        info!(
            "Connected to gateway {} (protocol {}, connection {})",
            hello.server.version, hello.protocol, hello.server.conn_id
        );
        Ok(hello)
    }

    async fn handshake(&self, attempt: &mut ConnectAttempt<'_>) -> Result<HelloOk> {
        let params = serde_json::to_value(ConnectParams::from_config(&self.config))?;
        let handle = self.send_request(CONNECT_METHOD, Some(params))?;
        attempt.handshake_id = Some(handle.id().to_string());

        HelloOk::from_payload(handle.wait().await?)
    }

    /// Close the session.
    ///
    /// Every pending request fails with [`ClientError::ConnectionClosed`].
    /// Safe to call repeatedly and on a client that never connected.
    pub fn disconnect(&self) {
        let had_transport = self.connection.close();
        *self.hello.write() = None;

        let failed = self.correlator.fail_all(|| ClientError::ConnectionClosed);
        if had_transport {
            info!("Disconnected from gateway ({} pending request(s) failed)", failed);
        }
    }

    /// Whether the handshake completed and the socket is still open.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Connection id assigned by the gateway during the handshake.
    pub fn connection_id(&self) -> Option<String> {
        self.connection.connection_id()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Handshake payload of the current session.
    pub fn hello(&self) -> Option<HelloOk> {
        self.hello.read().clone()
    }

    /// Number of requests awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_count()
    }

    /// Number of registered event listeners.
    pub fn listener_count(&self) -> usize {
        self.dispatcher.len()
    }

    /// Register a callback for every event the gateway pushes.
    ///
    /// Listeners run on the connection's reader task and should return
    /// quickly. A panicking listener is logged and skipped.
    pub fn add_event_listener<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&EventFrame) + Send + Sync + 'static,
    {
        self.dispatcher.add_listener(listener)
    }

    /// Call a gateway method and return its raw payload.
    ///
    /// Fails with [`ClientError::NotConnected`] unless the handshake has
    /// completed and the socket is open.
    pub async fn call<P>(&self, method: &str, params: P) -> Result<Value>
    where
        P: Serialize,
    {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let params = match serde_json::to_value(params)? {
            Value::Null => None,
            value => Some(value),
        };
        self.send_request(method, params)?.wait().await
    }

    /// Call a gateway method and deserialize its payload.
    pub async fn call_as<T, P>(&self, method: &str, params: P) -> Result<T>
    where
        T: DeserializeOwned,
        P: Serialize,
    {
        let payload = self.call(method, params).await?;
        Ok(serde_json::from_value(payload)?)
    }

    /// Register and transmit one request frame.
    ///
    /// Send failures are delivered through the returned handle.
    fn send_request(&self, method: &str, params: Option<Value>) -> Result<ResponseHandle> {
        if !self.connection.is_transport_open() {
            return Err(ClientError::NotConnected);
        }

        let handle = self.correlator.begin(method);
        let sent = frame::encode(&RequestFrame::new(handle.id(), method, params))
            .map_err(ClientError::from)
            .and_then(|raw| self.connection.send_text(raw));

        match sent {
            Ok(()) => debug!("Sent request {} ({})", handle.id(), method),
            Err(e) => {
                self.correlator.fail(handle.id(), e);
            }
        }
        Ok(handle)
    }
}

/// Unfinished `connect` call. Tears the attempt down unless disarmed.
struct ConnectAttempt<'a> {
    client: &'a GatewayClient,
    token: u64,
    handshake_id: Option<String>,
    armed: bool,
}

impl Drop for ConnectAttempt<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if self.client.connection.abort_connect(self.token) {
            debug!("Abandoned connect attempt; transport closed");
        }
        if let Some(id) = self.handshake_id.take() {
            self.client.correlator.fail(&id, ClientError::ConnectionClosed);
        }
    }
}

impl Drop for GatewayClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("gateway_url", &self.config.gateway_url)
            .field("state", &self.state())
            .field("connection_id", &self.connection_id())
            .field("pending_requests", &self.pending_requests())
            .finish()
    }
}
