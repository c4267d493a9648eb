//! Method-name → handler map, built once at startup

use std::collections::HashMap;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::ServerContext;
use super::handlers;
use crate::infra::lsp::protocol::{RpcError, methods};

pub type HandlerResult = Result<Value, RpcError>;

/// What a request handler hands back to the dispatch loop
pub enum Reply {
    /// Respond right away
    Ready(HandlerResult),
    /// Respond when the future completes; runs off the dispatch loop
    Deferred(BoxFuture<'static, HandlerResult>),
}

pub type RequestHandler = for<'a> fn(&'a ServerContext, Option<Value>) -> BoxFuture<'a, Reply>;
pub type NotificationHandler =
    for<'a> fn(&'a ServerContext, Option<Value>) -> BoxFuture<'a, Result<(), RpcError>>;

/// Accepted and dropped without a handler
const IGNORED: &[&str] = &[methods::CANCEL_REQUEST, methods::SET_TRACE];

pub struct Dispatcher {
    requests: HashMap<&'static str, RequestHandler>,
    notifications: HashMap<&'static str, NotificationHandler>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let mut requests: HashMap<&'static str, RequestHandler> = HashMap::new();
        requests.insert(methods::INITIALIZE, handlers::initialize);
        requests.insert(methods::SHUTDOWN, handlers::shutdown);
        requests.insert(methods::COMPLETION, handlers::completion);
        requests.insert(methods::INLINE_COMPLETION, handlers::inline_completion);

        let mut notifications: HashMap<&'static str, NotificationHandler> = HashMap::new();
        notifications.insert(methods::INITIALIZED, handlers::initialized);
        notifications.insert(methods::DID_OPEN, handlers::did_open);
        notifications.insert(methods::DID_CHANGE, handlers::did_change);
        notifications.insert(methods::DID_SAVE, handlers::did_save);
        notifications.insert(methods::DID_CLOSE, handlers::did_close);

        Self {
            requests,
            notifications,
        }
    }

    pub fn request(&self, method: &str) -> Option<RequestHandler> {
        self.requests.get(method).copied()
    }

    pub fn notification(&self, method: &str) -> Option<NotificationHandler> {
        self.notifications.get(method).copied()
    }

    pub fn is_ignored(method: &str) -> bool {
        IGNORED.contains(&method)
    }
}

/// Deserialize params, mapping failures to -32602
pub fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, RpcError> {
    serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|e| RpcError::invalid_params(&e.to_string()))
}

/// Serialize a handler result
pub fn to_result<T: serde::Serialize>(value: &T) -> HandlerResult {
    serde_json::to_value(value).map_err(|e| RpcError::internal_error(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::lsp::protocol::error_codes;
    use crate::models::lsp::CompletionParams;
    use serde_json::json;

    #[test]
    fn test_registered_methods() {
        let dispatcher = Dispatcher::new();
        for method in [
            methods::INITIALIZE,
            methods::SHUTDOWN,
            methods::COMPLETION,
            methods::INLINE_COMPLETION,
        ] {
            assert!(dispatcher.request(method).is_some(), "{method}");
            assert!(dispatcher.notification(method).is_none(), "{method}");
        }
        for method in [
            methods::INITIALIZED,
            methods::DID_OPEN,
            methods::DID_CHANGE,
            methods::DID_SAVE,
            methods::DID_CLOSE,
        ] {
            assert!(dispatcher.notification(method).is_some(), "{method}");
        }
        assert!(dispatcher.request("textDocument/hover").is_none());
        assert!(dispatcher.request(methods::EXIT).is_none());
    }

    #[test]
    fn test_ignored_methods() {
        assert!(Dispatcher::is_ignored("$/cancelRequest"));
        assert!(Dispatcher::is_ignored("$/setTrace"));
        assert!(!Dispatcher::is_ignored("$/progress"));
    }

    #[test]
    fn test_parse_params() {
        let params: CompletionParams = parse_params(Some(json!({
            "textDocument": {"uri": "file:///a.go"},
            "position": {"line": 1, "character": 8}
        })))
        .unwrap();
        assert_eq!(params.position.character, 8);

        let err = parse_params::<CompletionParams>(None).unwrap_err();
        assert_eq!(err.code, error_codes::INVALID_PARAMS);
        let err = parse_params::<CompletionParams>(Some(json!({"position": 3}))).unwrap_err();
        assert_eq!(err.code, error_codes::INVALID_PARAMS);
    }
}
