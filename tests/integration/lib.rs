//! In-process mock gateway for end-to-end client tests.
//!
//! The gateway accepts WebSocket connections on a loopback port, answers
//! the `connect` handshake according to a [`Handshake`] policy and then
//! hands each connection to the test as a [`GatewayConn`], which can read
//! the client's requests and push responses, events or raw text.

use futures::{SinkExt, StreamExt};
use openclaw_client::ClientConfig;
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

/// How the mock answers the `connect` handshake.
#[derive(Debug, Clone)]
pub enum Handshake {
    /// Reply `hello-ok`; connections get ids `c1`, `c2`, ...
    Accept,
    /// Reply with an error frame.
    Reject { code: String, message: String },
    /// Reply `ok` with this exact payload.
    Payload(Value),
    /// Never reply.
    Ignore,
}

/// Await `fut`, failing the test if it takes longer than [`WAIT`].
pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(WAIT, fut)
        .await
        .expect("timed out waiting in test")
}

/// Loopback WebSocket server speaking the gateway frame protocol.
pub struct MockGateway {
    addr: SocketAddr,
    connections: mpsc::UnboundedReceiver<GatewayConn>,
    accept_task: JoinHandle<()>,
}

impl MockGateway {
    /// Start a gateway with the given handshake policy.
    pub async fn start(handshake: Handshake) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock gateway");
        let addr = listener.local_addr().expect("mock gateway address");
        let (tx, connections) = mpsc::unbounded_channel();

        let accept_task = tokio::spawn(async move {
            let mut count = 0u32;
            while let Ok((stream, _)) = listener.accept().await {
                count += 1;
                let conn_id = format!("c{}", count);
                tokio::spawn(serve(stream, handshake.clone(), conn_id, tx.clone()));
            }
        });

        Self {
            addr,
            connections,
            accept_task,
        }
    }

    /// `ws://` URL of the gateway.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Client configuration pointing at this gateway.
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.url(), "test-token")
    }

    /// Client configuration with a short request timeout.
    pub fn config_with_timeout(&self, timeout_ms: u64) -> ClientConfig {
        self.config()
            .with_request_timeout(Duration::from_millis(timeout_ms))
    }

    /// Next connection whose handshake frame has been received.
    pub async fn next_connection(&mut self) -> GatewayConn {
        within(self.connections.recv())
            .await
            .expect("mock gateway stopped")
    }
}

impl Drop for MockGateway {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// Server side of one client connection.
pub struct GatewayConn {
    /// Connection id handed out in `hello-ok` (for [`Handshake::Accept`]).
    pub conn_id: String,
    /// The client's `connect` request frame.
    pub handshake: Value,
    inbound: mpsc::UnboundedReceiver<Value>,
    outbound: mpsc::UnboundedSender<Message>,
}

impl GatewayConn {
    /// Next request frame from the client, or `None` once it disconnected.
    pub async fn next_request(&mut self) -> Option<Value> {
        within(self.inbound.recv()).await
    }

    /// Read `n` request frames.
    pub async fn requests(&mut self, n: usize) -> Vec<Value> {
        let mut frames = Vec::with_capacity(n);
        for _ in 0..n {
            frames.push(self.next_request().await.expect("client disconnected"));
        }
        frames
    }

    /// Wait until the client closes the socket.
    pub async fn wait_closed(&mut self) {
        while self.next_request().await.is_some() {}
    }

    /// Send raw text.
    pub fn send_raw(&self, text: impl Into<String>) {
        let _ = self.outbound.send(Message::Text(text.into()));
    }

    /// Send a JSON frame.
    pub fn send(&self, frame: Value) {
        self.send_raw(frame.to_string());
    }

    /// Answer a request successfully.
    pub fn respond_ok(&self, id: &str, payload: Value) {
        self.send(json!({"type": "res", "id": id, "ok": true, "payload": payload}));
    }

    /// Answer a request with an error frame.
    pub fn respond_err(&self, id: &str, code: &str, message: &str) {
        self.send(json!({
            "type": "res",
            "id": id,
            "ok": false,
            "error": {"code": code, "message": message}
        }));
    }

    /// Push an event.
    pub fn send_event(&self, event: &str, payload: Value, seq: u64) {
        self.send(json!({"type": "event", "event": event, "payload": payload, "seq": seq}));
    }

    /// Close the connection from the gateway side.
    pub fn close(&self) {
        let _ = self.outbound.send(Message::Close(None));
    }
}

/// Build a `hello-ok` payload.
pub fn hello_ok(conn_id: &str) -> Value {
    json!({
        "type": "hello-ok",
        "protocol": 3,
        "server": {"version": "2026.1.0", "connId": conn_id, "host": "mock"},
        "features": {
            "methods": ["agents.list", "chat.send", "config.get"],
            "events": ["chat.event", "presence", "tick"]
        },
        "snapshot": {"presence": []},
        "policy": {"maxPayload": 1048576, "maxBufferedBytes": 4194304, "tickIntervalMs": 30000}
    })
}

/// Read one request id out of a frame.
pub fn frame_id(frame: &Value) -> String {
    frame["id"].as_str().expect("request frame id").to_string()
}

async fn serve(
    stream: TcpStream,
    handshake: Handshake,
    conn_id: String,
    connections: mpsc::UnboundedSender<GatewayConn>,
) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let (mut sink, mut stream) = ws.split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
    let (inbound_tx, inbound) = mpsc::unbounded_channel();

    // First frame must be the handshake.
    let connect = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<Value>(&text) {
                Ok(frame) => break frame,
                Err(_) => continue,
            },
            Some(Ok(_)) => continue,
            _ => return,
        }
    };

    let id = connect["id"].as_str().unwrap_or_default().to_string();
    let reply = match &handshake {
        Handshake::Accept => Some(json!({
            "type": "res", "id": id, "ok": true, "payload": hello_ok(&conn_id)
        })),
        Handshake::Reject { code, message } => Some(json!({
            "type": "res", "id": id, "ok": false,
            "error": {"code": code, "message": message}
        })),
        Handshake::Payload(payload) => Some(json!({
            "type": "res", "id": id, "ok": true, "payload": payload
        })),
        Handshake::Ignore => None,
    };
    if let Some(reply) = reply {
        if sink.send(Message::Text(reply.to_string())).await.is_err() {
            return;
        }
    }

    let conn = GatewayConn {
        conn_id,
        handshake: connect,
        inbound,
        outbound,
    };
    if connections.send(conn).is_err() {
        return;
    }

    loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(frame) = serde_json::from_str::<Value>(&text) {
                        let _ = inbound_tx.send(frame);
                    }
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
            outgoing = outbound_rx.recv() => match outgoing {
                Some(message) => {
                    let closing = matches!(message, Message::Close(_));
                    if sink.send(message).await.is_err() || closing {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    let _ = sink.close().await;
}
