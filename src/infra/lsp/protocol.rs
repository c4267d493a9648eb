//! JSON-RPC 2.0 envelope for the language server
//!
//! Payload types live in `models/lsp.rs`; params stay untyped here until
//! the dispatcher knows which handler they belong to.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

pub const JSONRPC_VERSION: &str = "2.0";

// ============================================================================
// JSON-RPC 2.0 Core Types
// ============================================================================

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 Response
///
/// `id` is serialized as `null` when the request id could not be read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Option<RequestId>,
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<RequestId>, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// A present `null` result is `Some(Value::Null)`; only a missing one is `None`
fn present_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// JSON-RPC 2.0 Notification (no id, no response expected)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// Request ID - can be number or string
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId::Number(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        RequestId::String(id.to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(id) => write!(f, "{id}"),
            RequestId::String(id) => write!(f, "\"{id}\""),
        }
    }
}

/// JSON-RPC Error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(msg: &str) -> Self {
        Self::new(error_codes::PARSE_ERROR, format!("Parse error: {msg}"))
    }

    pub fn invalid_request(msg: &str) -> Self {
        Self::new(error_codes::INVALID_REQUEST, format!("Invalid request: {msg}"))
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
        )
    }

    pub fn invalid_params(msg: &str) -> Self {
        Self::new(error_codes::INVALID_PARAMS, format!("Invalid params: {msg}"))
    }

    pub fn internal_error(msg: &str) -> Self {
        Self::new(error_codes::INTERNAL_ERROR, format!("Internal error: {msg}"))
    }

    pub fn server_not_initialized() -> Self {
        Self::new(
            error_codes::SERVER_NOT_INITIALIZED,
            "Server not initialized",
        )
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

impl From<&ProtocolError> for RpcError {
    fn from(error: &ProtocolError) -> Self {
        match error {
            ProtocolError::Json(e) => Self::parse_error(&e.to_string()),
            ProtocolError::InvalidUtf8 => Self::parse_error(&error.to_string()),
            other => Self::invalid_request(&other.to_string()),
        }
    }
}

/// Standard JSON-RPC error codes
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    // LSP-specific error codes
    pub const SERVER_NOT_INITIALIZED: i32 = -32002;
}

/// LSP method names handled by the server
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "initialized";
    pub const SHUTDOWN: &str = "shutdown";
    pub const EXIT: &str = "exit";

    pub const DID_OPEN: &str = "textDocument/didOpen";
    pub const DID_CHANGE: &str = "textDocument/didChange";
    pub const DID_SAVE: &str = "textDocument/didSave";
    pub const DID_CLOSE: &str = "textDocument/didClose";

    pub const COMPLETION: &str = "textDocument/completion";
    pub const INLINE_COMPLETION: &str = "textDocument/inlineCompletion";

    pub const CANCEL_REQUEST: &str = "$/cancelRequest";
    pub const SET_TRACE: &str = "$/setTrace";

    pub const LOG_MESSAGE: &str = "window/logMessage";
}

/// Incoming message from the client
#[derive(Debug, Clone)]
pub enum Message {
    Request(Request),
    Response(Response),
    Notification(Notification),
}

impl Message {
    /// Parse a JSON body into a Message
    ///
    /// Bodies that are not JSON fail with [`ProtocolError::Json`]; JSON that
    /// is not a JSON-RPC message fails with [`ProtocolError::InvalidMessage`].
    pub fn parse(json: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(json)?;
        if !value.is_object() {
            return Err(ProtocolError::InvalidMessage(
                "expected a JSON object".into(),
            ));
        }

        let has_id = value.get("id").is_some_and(|id| !id.is_null());
        let has_method = value.get("method").is_some();

        let invalid = |e: serde_json::Error| ProtocolError::InvalidMessage(e.to_string());
        match (has_id, has_method) {
            (true, true) => Ok(Message::Request(
                serde_json::from_value(value).map_err(invalid)?,
            )),
            (_, false) if value.get("result").is_some() || value.get("error").is_some() => Ok(
                Message::Response(serde_json::from_value(value).map_err(invalid)?),
            ),
            (false, true) => Ok(Message::Notification(
                serde_json::from_value(value).map_err(invalid)?,
            )),
            _ => Err(ProtocolError::InvalidMessage(
                "neither a request, a notification nor a response".into(),
            )),
        }
    }

    /// Request id, if the message carries one
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Message::Request(request) => Some(&request.id),
            Message::Response(response) => response.id.as_ref(),
            Message::Notification(_) => None,
        }
    }
}

/// Best-effort id recovery from a body that failed to parse as a message
pub fn salvage_id(json: &str) -> Option<RequestId> {
    let value: Value = serde_json::from_str(json).ok()?;
    serde_json::from_value(value.get("id")?.clone()).ok()
}
