//! Inbound message parsing.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::JSONRPC_VERSION;
use crate::error::ProtocolError;
use crate::types::Announcement;

/// JSON-RPC error code used when a response carries neither result nor error.
pub const MALFORMED_RESPONSE_CODE: i64 = -32603;

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Announce(Announcement),
    Response(ConfigurationResponse),
}

/// Error payload of a configuration response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Response to a configure request.
///
/// Exactly one of `result` and `error` is expected. Use [`ConfigurationResponse::is_error`]
/// rather than inspecting the fields directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigurationResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl ConfigurationResponse {
    pub fn success(id: impl Into<String>, result: Value) -> Self {
        Self {
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(ResponseError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Whether this response must be reported as an error.
    ///
    /// An error payload wins over a result. A response with neither is malformed
    /// and also reported as an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some() || self.result.is_none()
    }

    /// Fill in an error description for a response that carries neither field.
    pub fn normalized(mut self) -> Self {
        if self.result.is_none() && self.error.is_none() {
            self.error = Some(ResponseError {
                code: MALFORMED_RESPONSE_CODE,
                message: "Malformed response: neither result nor error present".to_string(),
                data: None,
            });
        }
        self
    }
}

/// Envelope shared by requests and responses.
#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    jsonrpc: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    result: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    error: Option<Value>,
}

/// Keep an explicit `null` as `Some(Value::Null)` so presence can be told apart.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Turn a JSON-RPC id into the correlation key used by the correlator.
fn id_to_string(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a message received from the wire.
pub fn parse_message(text: &str) -> Result<Message, ProtocolError> {
    let raw: RawMessage = serde_json::from_str(text)?;

    if let Some(version) = raw.jsonrpc.as_deref() {
        if version != JSONRPC_VERSION {
            return Err(ProtocolError::Version(version.to_string()));
        }
    }

    match raw.method.as_deref() {
        Some("announce") => {
            let params = raw.params.ok_or(ProtocolError::MissingField("params"))?;
            let announcement: Announcement = serde_json::from_value(params)?;
            if announcement.device.uuid.is_empty() {
                return Err(ProtocolError::MissingField("device.uuid"));
            }
            Ok(Message::Announce(announcement))
        }
        Some(other) => Err(ProtocolError::UnsupportedMethod(other.to_string())),
        None => {
            if raw.result.is_none() && raw.error.is_none() && raw.id.is_none() {
                return Err(ProtocolError::UnknownKind);
            }
            let id = raw
                .id
                .as_ref()
                .and_then(id_to_string)
                .ok_or(ProtocolError::MissingField("id"))?;
            let error = raw.error.map(|value| {
                serde_json::from_value::<ResponseError>(value.clone()).unwrap_or(ResponseError {
                    code: MALFORMED_RESPONSE_CODE,
                    message: format!("Unrecognized error payload: {}", value),
                    data: Some(value),
                })
            });
            Ok(Message::Response(ConfigurationResponse {
                id,
                result: raw.result,
                error,
            }))
        }
    }
}
