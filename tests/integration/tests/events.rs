//! Event fan-out and remote-close tests.

use openclaw_client::{ClientError, ConnectionState, EventFrame, GatewayClient};
use openclaw_integration_tests::{frame_id, within, Handshake, MockGateway};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Register a listener that forwards every event into a channel.
fn forward(client: &GatewayClient) -> mpsc::UnboundedReceiver<EventFrame> {
    let (tx, rx) = mpsc::unbounded_channel();
    client.add_event_listener(move |frame| {
        let _ = tx.send(frame.clone());
    });
    rx
}

#[tokio::test]
async fn test_listener_receives_exact_frame() {
    let mut gateway = MockGateway::start(Handshake::Accept).await;
    let client = GatewayClient::new(gateway.config());
    let mut events = forward(&client);
    within(client.connect()).await.unwrap();
    let conn = gateway.next_connection().await;

    conn.send(json!({
        "type": "event",
        "event": "presence",
        "payload": {"online": 2},
        "seq": 41,
        "stateVersion": {"presence": 7, "health": 3}
    }));

    let frame = within(events.recv()).await.unwrap();
    assert_eq!(frame.event, "presence");
    assert_eq!(frame.payload, Some(json!({"online": 2})));
    assert_eq!(frame.seq, Some(41));
    let version = frame.state_version.unwrap();
    assert_eq!((version.presence, version.health), (7, 3));
}

#[tokio::test]
async fn test_fan_out_in_order_and_removal() {
    let mut gateway = MockGateway::start(Handshake::Accept).await;
    let client = GatewayClient::new(gateway.config());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let first = client.add_event_listener({
        let tx = tx.clone();
        move |frame| {
            let _ = tx.send(format!("first:{}", frame.event));
        }
    });
    client.add_event_listener(move |frame| {
        let _ = tx.send(format!("second:{}", frame.event));
    });

    within(client.connect()).await.unwrap();
    let conn = gateway.next_connection().await;

    conn.send_event("tick", json!({}), 1);
    assert_eq!(within(rx.recv()).await.unwrap(), "first:tick");
    assert_eq!(within(rx.recv()).await.unwrap(), "second:tick");

    assert!(first.remove());
    conn.send_event("tick", json!({}), 2);
    assert_eq!(within(rx.recv()).await.unwrap(), "second:tick");
    assert_eq!(client.listener_count(), 1);
}

#[tokio::test]
async fn test_panicking_listener_does_not_block_others() {
    let mut gateway = MockGateway::start(Handshake::Accept).await;
    let client = GatewayClient::new(gateway.config());
    client.add_event_listener(|frame| {
        if frame.event == "chat.event" {
            panic!("listener failure");
        }
    });
    let mut events = forward(&client);

    within(client.connect()).await.unwrap();
    let conn = gateway.next_connection().await;

    conn.send_event("chat.event", json!({"text": "hi"}), 1);
    conn.send_event("chat.event", json!({"text": "again"}), 2);

    assert_eq!(within(events.recv()).await.unwrap().seq, Some(1));
    assert_eq!(within(events.recv()).await.unwrap().seq, Some(2));
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_malformed_frames_are_tolerated() {
    let mut gateway = MockGateway::start(Handshake::Accept).await;
    let client = Arc::new(GatewayClient::new(gateway.config()));
    let mut events = forward(&client);
    within(client.connect()).await.unwrap();
    let mut conn = gateway.next_connection().await;

    conn.send_raw("this is not json");
    conn.send_raw(r#"{"type":"mystery"}"#);
    conn.send_raw(r#"{"id":"req-1","ok":true}"#);
    conn.send(json!({"type": "req", "id": "srv-1", "method": "ping"}));
    conn.send_event("after", json!(null), 9);

    let frame = within(events.recv()).await.unwrap();
    assert_eq!(frame.event, "after");

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call("config.get", json!({})).await }
    });
    let request = conn.next_request().await.unwrap();
    conn.respond_ok(&frame_id(&request), json!({"ok": 1}));
    assert_eq!(within(call).await.unwrap().unwrap(), json!({"ok": 1}));
}

#[tokio::test]
async fn test_remote_close_does_not_reject_pending() {
    let mut gateway = MockGateway::start(Handshake::Accept).await;
    let client = Arc::new(GatewayClient::new(gateway.config_with_timeout(300)));
    within(client.connect()).await.unwrap();
    let mut conn = gateway.next_connection().await;

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call("agent.wait", json!({})).await }
    });
    conn.next_request().await.unwrap();
    conn.close();

    // The pending request is left to its own timer.
    let err = within(call).await.unwrap().unwrap_err();
    assert!(
        matches!(err, ClientError::RequestTimeout { .. }),
        "expected timeout, got {:?}",
        err
    );

    assert!(!client.is_connected());
    assert_eq!(client.state(), ConnectionState::Closed);
    // Only an explicit disconnect forgets the connection id.
    assert_eq!(client.connection_id().as_deref(), Some("c1"));

    let err = client.call("agents.list", json!({})).await.unwrap_err();
    assert!(matches!(err, ClientError::NotConnected));
}

#[tokio::test]
async fn test_remote_close_leaves_pending_for_disconnect() {
    let mut gateway = MockGateway::start(Handshake::Accept).await;
    let client = Arc::new(GatewayClient::new(gateway.config()));
    within(client.connect()).await.unwrap();
    let mut conn = gateway.next_connection().await;

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call("agent.wait", json!({})).await }
    });
    conn.next_request().await.unwrap();
    conn.close();

    within(async {
        while client.state() != ConnectionState::Closed {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert_eq!(client.pending_requests(), 1);

    client.disconnect();
    let err = within(call).await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::ConnectionClosed));
}

#[tokio::test]
async fn test_listeners_persist_across_reconnect() {
    let mut gateway = MockGateway::start(Handshake::Accept).await;
    let client = GatewayClient::new(gateway.config());
    let mut events = forward(&client);

    within(client.connect()).await.unwrap();
    let first = gateway.next_connection().await;
    first.send_event("tick", json!({}), 1);
    assert_eq!(within(events.recv()).await.unwrap().seq, Some(1));

    client.disconnect();
    within(client.connect()).await.unwrap();
    let second = gateway.next_connection().await;
    second.send_event("tick", json!({}), 2);

    assert_eq!(within(events.recv()).await.unwrap().seq, Some(2));
    assert_eq!(client.listener_count(), 1);
}

#[tokio::test]
async fn test_reconnect_after_remote_close() {
    let mut gateway = MockGateway::start(Handshake::Accept).await;
    let client = GatewayClient::new(gateway.config());
    within(client.connect()).await.unwrap();
    gateway.next_connection().await.close();

    within(async {
        while client.is_connected() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    let hello = within(client.connect()).await.unwrap();
    assert_eq!(hello.server.conn_id, "c2");
    assert!(client.is_connected());
}
