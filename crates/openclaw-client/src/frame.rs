//! Wire frames and the JSON text codec.
//!
//! Every message on the gateway socket is a JSON object whose `type` field
//! selects one of three shapes: `req`, `res` or `event`. The client only ever
//! encodes requests; responses and events are decode-only.

use crate::error::{ClientError, RemoteError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Discriminator value for request frames.
pub const REQUEST_TYPE: &str = "req";

/// Discriminator value for response frames.
pub const RESPONSE_TYPE: &str = "res";

/// Discriminator value for event frames.
pub const EVENT_TYPE: &str = "event";

/// A request sent to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    /// Correlation id.
    pub id: String,

    /// Method name.
    pub method: String,

    /// Method parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RequestFrame {
    /// Create a new request frame.
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// The gateway's answer to one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    /// Correlation id of the originating request.
    pub id: String,

    /// Whether the request succeeded.
    pub ok: bool,

    /// Result payload (when `ok`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    /// Error object (when not `ok`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RemoteError>,
}

impl ResponseFrame {
    /// Convert the frame into the outcome of its request.
    ///
    /// A successful frame without a payload yields `null`. A failed frame
    /// without an error object yields a generic `UNKNOWN` remote error.
    pub fn into_result(self) -> Result<Value, RemoteError> {
        if self.ok {
            Ok(self.payload.unwrap_or(Value::Null))
        } else {
            Err(self
                .error
                .unwrap_or_else(|| RemoteError::new("UNKNOWN", "Request failed")))
        }
    }
}

/// Snapshot counters attached to some events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateVersion {
    /// Presence state version.
    pub presence: u64,

    /// Health state version.
    pub health: u64,
}

/// An unsolicited event pushed by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFrame {
    /// Event name (e.g. `agent.event`, `chat.event`).
    pub event: String,

    /// Event payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    /// Monotonic sequence number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,

    /// State snapshot counters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_version: Option<StateVersion>,
}

/// Any frame that can travel over the socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Request(RequestFrame),
    Response(ResponseFrame),
    Event(EventFrame),
}

impl Frame {
    /// The wire discriminator for this frame.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Request(_) => REQUEST_TYPE,
            Self::Response(_) => RESPONSE_TYPE,
            Self::Event(_) => EVENT_TYPE,
        }
    }
}

/// Failure to decode an inbound message.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not JSON, or a known frame type with the wrong shape.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Valid JSON without a string `type` field.
    #[error("frame has no type discriminator")]
    MissingType,

    /// A `type` value the protocol does not define.
    #[error("unknown frame type: {0}")]
    UnknownType(String),
}

impl From<DecodeError> for ClientError {
    fn from(err: DecodeError) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Decode one text message into a frame.
pub fn decode(raw: &str) -> Result<Frame, DecodeError> {
    let mut value: Value = serde_json::from_str(raw)?;

    let kind = match value.get("type").and_then(Value::as_str) {
        Some(kind) => kind.to_string(),
        None => return Err(DecodeError::MissingType),
    };
    if let Some(object) = value.as_object_mut() {
        object.remove("type");
    }

    match kind.as_str() {
        REQUEST_TYPE => Ok(Frame::Request(serde_json::from_value(value)?)),
        RESPONSE_TYPE => Ok(Frame::Response(serde_json::from_value(value)?)),
        EVENT_TYPE => Ok(Frame::Event(serde_json::from_value(value)?)),
        _ => Err(DecodeError::UnknownType(kind)),
    }
}

/// Borrowed view used to serialize a request with its discriminator.
#[derive(Serialize)]
struct TaggedRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    id: &'a str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a Value>,
}

/// Encode a request frame as JSON text.
pub fn encode(frame: &RequestFrame) -> Result<String, serde_json::Error> {
    serde_json::to_string(&TaggedRequest {
        kind: REQUEST_TYPE,
        id: &frame.id,
        method: &frame.method,
        params: frame.params.as_ref(),
    })
}
