//! Frame - the JSON envelope carried by the channel.
//!
//! Every transport message is one frame:
//! - `request`: client → server, answered by exactly one `ack` with the same id
//! - `ack`: server → client, `success` plus either data fields or `error`
//! - `push`: server → client, never answered

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::{PushEvent, RequestId, WireError};

/// One message on the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    /// Client-initiated request
    Request {
        /// Correlation id
        id: RequestId,
        /// Event name, e.g. `sendMessage`
        event: String,
        /// Request body
        payload: Value,
    },
    /// Acknowledgement of a request
    Ack(Ack),
    /// Server-initiated event
    Push {
        /// Event name, e.g. `newMessage`
        event: String,
        /// Event body
        #[serde(default)]
        data: Value,
    },
}

impl Frame {
    /// Build a push frame from a typed event.
    pub fn push(event: PushEvent) -> Result<Self, WireError> {
        let (event, data) = event.into_parts()?;
        Ok(Frame::Push { event, data })
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(self).map_err(WireError::Serialization)
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        serde_json::from_slice(bytes).map_err(WireError::Deserialization)
    }
}

/// The one-shot response to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    /// Id of the request being answered
    pub id: RequestId,
    /// Whether the server performed the action
    pub success: bool,
    /// Human-readable failure, surfaced verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Response fields
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Ack {
    /// A successful ack carrying the fields of `data` (must be a JSON object or null).
    pub fn ok(id: RequestId, data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id,
            success: true,
            error: None,
            data,
        }
    }

    /// A failed ack with an error message.
    pub fn failed(id: RequestId, error: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            error: Some(error.into()),
            data: Map::new(),
        }
    }

    /// Error text of a failed ack, with a fallback when the server sent none.
    pub fn error_text(&self, fallback: &str) -> String {
        self.error
            .clone()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }

    /// Decode the response fields into a typed response.
    pub fn decode<R: DeserializeOwned>(self) -> Result<R, WireError> {
        serde_json::from_value(Value::Object(self.data)).map_err(WireError::Deserialization)
    }
}

/// How a channel authenticates when it connects.
#[derive(Clone, PartialEq, Eq)]
pub enum Handshake {
    /// Long-lived channel with a bearer token
    Token(String),
    /// Short-lived anonymous channel scoped to one event
    Flow(String),
}

impl Handshake {
    /// Query parameter carrying this handshake.
    pub fn query_pair(&self) -> (&'static str, &str) {
        match self {
            Handshake::Token(token) => ("token", token),
            Handshake::Flow(flow) => ("flow", flow),
        }
    }

    /// Whether this handshake opens an authenticated channel.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Handshake::Token(_))
    }
}

impl fmt::Debug for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handshake::Token(_) => write!(f, "Handshake::Token([REDACTED])"),
            Handshake::Flow(flow) => write!(f, "Handshake::Flow({flow})"),
        }
    }
}
