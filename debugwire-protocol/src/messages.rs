//! JSON frame shapes exchanged with the remote process
//!
//! Outgoing: `{"id": 1, "method": "Domain.name", "params": {...}}`
//!
//! Incoming response: `{"id": 1, "result": {...}}` or `{"id": 1, "error": {...}}`
//!
//! Incoming event: `{"method": "Domain.name", "params": {...}}`

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::binding::Command;

/// A command as written to the wire
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingCommand {
    pub id: i64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl OutgoingCommand {
    /// Wrap a typed request. A request with no fields set serializes without
    /// a `params` member.
    pub fn new<C: Command>(id: i64, command: &C) -> Result<Self, serde_json::Error> {
        let params = serde_json::to_value(command)?;
        Ok(Self::raw(id, C::METHOD, Some(params)))
    }

    /// Build a frame for an arbitrary method
    pub fn raw(id: i64, method: impl Into<String>, params: Option<Value>) -> Self {
        let params = params.filter(|p| !is_empty_params(p));
        Self {
            id,
            method: method.into(),
            params,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn is_empty_params(params: &Value) -> bool {
    match params {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Error object carried by a failed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A response frame. `id` is optional because some remotes omit it on errors.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFrame {
    pub id: Option<i64>,
    pub method: Option<String>,
    pub result: Option<Value>,
    pub error: Option<RemoteError>,
}

impl ResponseFrame {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// The result object, or the remote error. A missing or null `result`
    /// becomes an empty object so that field-less responses still decode.
    pub fn into_result(self) -> Result<Value, RemoteError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        match self.result {
            Some(Value::Null) | None => Ok(Value::Object(Map::new())),
            Some(result) => Ok(result),
        }
    }
}

/// An event frame with its still-undecoded params
#[derive(Debug, Clone, PartialEq)]
pub struct EventFrame {
    pub method: String,
    pub params: Value,
}

/// Wire-level classification of one complete inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Response(ResponseFrame),
    Event(EventFrame),
    /// Valid UTF-8 that is neither a response nor an event
    Unrecognized(String),
}

#[derive(Deserialize)]
struct IncomingFrame {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RemoteError>,
}

/// Classify a complete inbound message.
///
/// Anything with an `id` is a response. Without an `id`, a frame carrying
/// `result` or `error` is still a response (routed by the dispatcher's
/// fallback rule); otherwise a `method` makes it an event.
pub fn classify(text: &str) -> InboundMessage {
    let frame: IncomingFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(_) => return InboundMessage::Unrecognized(text.to_string()),
    };

    if frame.id.is_some() || frame.result.is_some() || frame.error.is_some() {
        return InboundMessage::Response(ResponseFrame {
            id: frame.id,
            method: frame.method,
            result: frame.result,
            error: frame.error,
        });
    }

    match frame.method {
        Some(method) => InboundMessage::Event(EventFrame {
            method,
            params: frame.params.unwrap_or_else(|| Value::Object(Map::new())),
        }),
        None => InboundMessage::Unrecognized(text.to_string()),
    }
}
