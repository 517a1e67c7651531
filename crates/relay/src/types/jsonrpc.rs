//! JSON-RPC 2.0 Types
//!
//! Envelopes for the JSON-RPC 2.0 messages MCP carries, plus decoding of a
//! raw POST body into a [`Frame`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ErrorData;

/// JSON-RPC version constant - always "2.0".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str("2.0")
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s == "2.0" {
            Ok(JsonRpcVersion)
        } else {
            Err(serde::de::Error::custom(format!(
                "expected JSON-RPC version '2.0', got '{}'",
                s
            )))
        }
    }
}

/// Request ID - can be a string or integer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// A client-originated request or notification.
///
/// Requests carry an `id`; notifications don't and never get a reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcMessage {
    pub jsonrpc: JsonRpcVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcMessage {
    pub fn request(id: impl Into<RequestId>, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id: Some(id.into()),
            method: method.into(),
            params: Some(params),
        }
    }

    pub fn notification(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id: None,
            method: method.into(),
            params: None,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// The response envelope: exactly one of `result` or `error` is set.
///
/// `id` serializes as `null` when the request id could not be recovered
/// (parse errors).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcReply {
    pub jsonrpc: JsonRpcVersion,
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorData>,
}

impl JsonRpcReply {
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<RequestId>, error: ErrorData) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn from_outcome(id: Option<RequestId>, outcome: Result<Value, ErrorData>) -> Self {
        match outcome {
            Ok(result) => Self::success(id, result),
            Err(error) => Self::failure(id, error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// One decoded POST body.
///
/// Clients send requests and notifications; they may also send replies to
/// server-initiated requests, which this server accepts and ignores.
#[derive(Debug, Clone)]
pub enum Frame {
    Message(JsonRpcMessage),
    Reply(JsonRpcReply),
}

impl Frame {
    /// Decode a body into a frame.
    ///
    /// Malformed JSON yields a parse error (-32700). Well-formed JSON that is
    /// not a single JSON-RPC 2.0 object yields an invalid request (-32600);
    /// batches are not accepted.
    pub fn decode(body: &[u8]) -> Result<Frame, ErrorData> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ErrorData::parse_error(format!("Parse error: {}", e)))?;

        let object = match &value {
            Value::Object(map) => map,
            Value::Array(_) => {
                return Err(ErrorData::invalid_request("Batch requests are not supported"))
            }
            _ => return Err(ErrorData::invalid_request("Expected a JSON-RPC object")),
        };

        if object.contains_key("method") {
            serde_json::from_value(value)
                .map(Frame::Message)
                .map_err(|e| ErrorData::invalid_request(format!("Invalid request: {}", e)))
        } else if object.contains_key("result") || object.contains_key("error") {
            serde_json::from_value(value)
                .map(Frame::Reply)
                .map_err(|e| ErrorData::invalid_request(format!("Invalid response: {}", e)))
        } else {
            Err(ErrorData::invalid_request(
                "Message has neither a method nor a result",
            ))
        }
    }
}
