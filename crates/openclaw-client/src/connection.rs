//! Connection lifecycle: the WebSocket transport and its state machine.
//!
//! ```text
//! Idle --connect--> Connecting --handshake ok--> Open
//!                        |                         |
//!                        +--fail/close--> Closed <-+--disconnect / remote close / error
//! ```
//!
//! The transport is split into a reader task, which decodes inbound frames
//! and hands them to a [`FrameHandler`], and a writer task fed through an
//! unbounded channel. Only this module touches the socket.

use crate::error::ClientError;
use crate::frame::{self, EventFrame, Frame, ResponseFrame};
use crate::Result;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected.
    Idle,
    /// Transport opening or handshake in flight.
    Connecting,
    /// Handshake completed.
    Open,
    /// Disconnected locally or by the remote end.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Receiver of decoded inbound frames.
pub trait FrameHandler: Send + Sync + 'static {
    /// A response to one of our requests arrived.
    fn on_response(&self, frame: ResponseFrame);

    /// The gateway pushed an event.
    fn on_event(&self, frame: EventFrame);
}

/// State shared with the reader task.
struct Shared {
    state: RwLock<ConnectionState>,
    /// Bumped whenever a transport is torn down, so a stale reader task
    /// cannot close its successor.
    epoch: AtomicU64,
}

/// A live socket: outbound queue plus its two I/O tasks.
struct Transport {
    outbound: mpsc::UnboundedSender<Message>,
    open: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Transport {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.outbound.is_closed()
    }

    fn shutdown(self) {
        self.open.store(false, Ordering::Release);
        // Queue a close frame; the writer exits after sending it.
        let _ = self.outbound.send(Message::Close(None));
        self.reader.abort();
        drop(self.writer);
    }
}

/// Owner of the gateway socket.
pub struct Connection {
    shared: Arc<Shared>,
    transport: Mutex<Option<Transport>>,
    connection_id: RwLock<Option<String>>,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection {
    /// Create an idle connection.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(ConnectionState::Idle),
                epoch: AtomicU64::new(0),
            }),
            transport: Mutex::new(None),
            connection_id: RwLock::new(None),
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    /// Connection id assigned by the gateway, if connected.
    pub fn connection_id(&self) -> Option<String> {
        self.connection_id.read().clone()
    }

    /// Whether the socket itself is open.
    pub fn is_transport_open(&self) -> bool {
        self.transport
            .lock()
            .as_ref()
            .map(Transport::is_open)
            .unwrap_or(false)
    }

    /// Whether the handshake completed and the socket is still open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open && self.is_transport_open()
    }

    /// Move to `Connecting`, refusing if a connection is live or being made.
    ///
    /// A stale transport left behind by a remote close is torn down here.
    /// Returns a token identifying this attempt for [`abort_connect`].
    ///
    /// [`abort_connect`]: Self::abort_connect
    pub fn begin_connect(&self) -> Result<u64> {
        let mut state = self.shared.state.write();
        match *state {
            ConnectionState::Connecting => return Err(ClientError::AlreadyConnected),
            ConnectionState::Open if self.is_transport_open() => {
                return Err(ClientError::AlreadyConnected)
            }
            _ => {}
        }

        if let Some(stale) = self.transport.lock().take() {
            debug!("Discarding stale transport before reconnecting");
            self.shared.epoch.fetch_add(1, Ordering::AcqRel);
            stale.shutdown();
        }

        *state = ConnectionState::Connecting;
        Ok(self.shared.epoch.load(Ordering::Acquire))
    }

    /// Tear down an unfinished connect attempt.
    ///
    /// No-op if the attempt was already superseded by a `close` or a newer
    /// attempt. Returns whether anything was torn down.
    pub fn abort_connect(&self, attempt: u64) -> bool {
        let mut state = self.shared.state.write();
        if self.shared.epoch.load(Ordering::Acquire) != attempt
            || *state != ConnectionState::Connecting
        {
            return false;
        }
        self.close_locked(&mut state);
        true
    }

    /// Open the WebSocket and start the I/O tasks.
    ///
    /// Suspends until the transport reports open. On failure the state
    /// moves to `Closed` and the transport error is returned.
    pub async fn open_transport(&self, url: &str, handler: Arc<dyn FrameHandler>) -> Result<()> {
        debug!("Opening WebSocket to {}", url);
        let epoch = self.shared.epoch.load(Ordering::Acquire);

        let ws = match connect_async(url).await {
            Ok((ws, _response)) => ws,
            Err(e) => {
                warn!("WebSocket connect to {} failed: {}", url, e);
                let mut state = self.shared.state.write();
                if self.shared.epoch.load(Ordering::Acquire) == epoch {
                    *state = ConnectionState::Closed;
                }
                return Err(ClientError::from(e));
            }
        };

        let state = self.shared.state.write();
        if *state != ConnectionState::Connecting
            || self.shared.epoch.load(Ordering::Acquire) != epoch
        {
            // Disconnected while the socket was opening; dropping it closes it.
            return Err(ClientError::ConnectionClosed);
        }

        let (sink, stream) = ws.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(true));

        let writer = tokio::spawn(write_loop(sink, outbound_rx, open.clone()));
        let reader = tokio::spawn(read_loop(
            stream,
            handler,
            open.clone(),
            self.shared.clone(),
            epoch,
        ));

        *self.transport.lock() = Some(Transport {
            outbound,
            open,
            reader,
            writer,
        });
        drop(state);

        debug!("WebSocket to {} open", url);
        Ok(())
    }

    /// Record a completed handshake.
    ///
    /// Returns `false` if the connection was closed while the handshake
    /// was in flight; the state is left untouched then.
    pub fn mark_open(&self, connection_id: String) -> bool {
        let mut state = self.shared.state.write();
        if *state != ConnectionState::Connecting {
            return false;
        }
        *self.connection_id.write() = Some(connection_id);
        *state = ConnectionState::Open;
        true
    }

    /// Queue a text frame for sending.
    pub fn send_text(&self, text: String) -> Result<()> {
        let transport = self.transport.lock();
        let transport = transport
            .as_ref()
            .filter(|t| t.is_open())
            .ok_or(ClientError::NotConnected)?;

        transport
            .outbound
            .send(Message::Text(text))
            .map_err(|_| ClientError::NotConnected)
    }

    /// Close the transport (if any), move to `Closed` and forget the
    /// connection id. Returns whether a transport was present.
    pub fn close(&self) -> bool {
        let mut state = self.shared.state.write();
        self.close_locked(&mut state)
    }

    fn close_locked(&self, state: &mut ConnectionState) -> bool {
        self.shared.epoch.fetch_add(1, Ordering::AcqRel);

        let transport = self.transport.lock().take();
        let had_transport = transport.is_some();
        if let Some(transport) = transport {
            transport.shutdown();
        }

        *state = ConnectionState::Closed;
        *self.connection_id.write() = None;
        had_transport
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .field("connection_id", &self.connection_id())
            .finish()
    }
}

async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    open: Arc<AtomicBool>,
) {
    while let Some(message) = outbound.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(e) = sink.send(message).await {
            warn!("Failed to send frame: {}", e);
            open.store(false, Ordering::Release);
            break;
        }
        if closing {
            break;
        }
    }

    let _ = sink.close().await;
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    handler: Arc<dyn FrameHandler>,
    open: Arc<AtomicBool>,
    shared: Arc<Shared>,
    epoch: u64,
) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => route(&text, handler.as_ref()),
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => route(text, handler.as_ref()),
                Err(_) => warn!("Dropping non-UTF-8 binary frame ({} bytes)", bytes.len()),
            },
            Ok(Message::Close(frame)) => {
                debug!("Close frame received: {:?}", frame);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket error: {}", e);
                break;
            }
        }
    }

    open.store(false, Ordering::Release);

    // Remote close: flip the flag only. Pending requests are left to their
    // own timers or to the next explicit disconnect.
    let mut state = shared.state.write();
    if shared.epoch.load(Ordering::Acquire) == epoch && *state != ConnectionState::Closed {
        *state = ConnectionState::Closed;
        info!("WebSocket connection closed");
    }
}

/// Decode one inbound text frame and hand it to the handler.
fn route(text: &str, handler: &dyn FrameHandler) {
    match frame::decode(text) {
        Ok(Frame::Response(response)) => handler.on_response(response),
        Ok(Frame::Event(event)) => handler.on_event(event),
        Ok(Frame::Request(request)) => {
            warn!(
                "Ignoring request frame from gateway: {} ({})",
                request.method, request.id
            );
        }
        Err(e) => error!("Failed to parse message: {}", e),
    }
}
