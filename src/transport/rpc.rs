//! JSON-RPC 2.0 method routing.
//!
//! # Data Flow
//! ```text
//! raw body ─► RpcRequest (parse error → -32700)
//!          ─► channel lookup ─► method lookup (missing → -32601)
//!          ─► handler(&RpcRequest) → Result<Value, RpcError>
//!          ─► RpcResponse { result | error, id }
//! ```

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::transport::TransportError;

pub const JSONRPC_VERSION: &str = "2.0";

/// A structured RPC error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("rpc error {code}: {message}")]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    pub const PARSE_ERROR: i32 = -32700;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const SERVER_INVALID: i32 = -32000;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn parse_error(detail: impl std::fmt::Display) -> Self {
        Self::new(Self::PARSE_ERROR, format!("parse error: {}", detail))
    }

    pub fn method_not_found(channel: &str, method: &str) -> Self {
        Self::new(
            Self::METHOD_NOT_FOUND,
            format!("method {} not found on channel {}", method, channel),
        )
    }

    pub fn invalid_params() -> Self {
        Self::new(Self::INVALID_PARAMS, "invalid parameters")
    }

    pub fn server_invalid(message: impl Into<String>) -> Self {
        Self::new(Self::SERVER_INVALID, message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl RpcRequest {
    pub fn new<P: Serialize>(method: &str, params: &P, id: u64) -> Result<Self, serde_json::Error> {
        Ok(Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params: Some(serde_json::to_value(params)?),
            id: Some(Value::from(id)),
        })
    }

    /// Decode the params object. Missing params decode from `{}`.
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, RpcError> {
        let params = self
            .params
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default()));
        serde_json::from_value(params).map_err(|_| RpcError::invalid_params())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    #[serde(default)]
    pub id: Option<Value>,
}

impl RpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Option<Value>, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Split into the result or the error.
    pub fn into_result(self) -> Result<Value, RpcError> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(error),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }
}

/// Handler for one RPC method.
pub type RpcHandler = Arc<dyn Fn(&RpcRequest) -> Result<Value, RpcError> + Send + Sync>;

/// Routes requests to handlers by channel and method name.
#[derive(Default)]
pub struct RpcServer {
    channels: DashMap<String, HashMap<String, RpcHandler>>,
}

impl RpcServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose a set of methods under `channel`.
    ///
    /// Fails if the channel is already taken.
    pub fn add_channel<I>(&self, channel: &str, methods: I) -> Result<(), TransportError>
    where
        I: IntoIterator<Item = (String, RpcHandler)>,
    {
        use dashmap::mapref::entry::Entry;

        match self.channels.entry(channel.to_string()) {
            Entry::Occupied(_) => Err(TransportError::ChannelTaken(channel.to_string())),
            Entry::Vacant(slot) => {
                let methods: HashMap<_, _> = methods.into_iter().collect();
                tracing::debug!(channel = %channel, methods = methods.len(), "RPC channel added");
                slot.insert(methods);
                Ok(())
            }
        }
    }

    pub fn remove_channel(&self, channel: &str) -> bool {
        self.channels.remove(channel).is_some()
    }

    pub fn dispatch(&self, channel: &str, request: &RpcRequest) -> RpcResponse {
        let handler = self
            .channels
            .get(channel)
            .and_then(|methods| methods.get(&request.method).cloned());

        let Some(handler) = handler else {
            tracing::debug!(channel = %channel, method = %request.method, "RPC method not found");
            return RpcResponse::failure(
                request.id.clone(),
                RpcError::method_not_found(channel, &request.method),
            );
        };

        match handler(request) {
            Ok(result) => RpcResponse::success(request.id.clone(), result),
            Err(error) => RpcResponse::failure(request.id.clone(), error),
        }
    }

    /// Parse a raw request body and dispatch it.
    pub fn dispatch_bytes(&self, channel: &str, body: &[u8]) -> RpcResponse {
        match serde_json::from_slice::<RpcRequest>(body) {
            Ok(request) => self.dispatch(channel, &request),
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "Malformed RPC request");
                RpcResponse::failure(None, RpcError::parse_error(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo() -> RpcHandler {
        Arc::new(|req: &RpcRequest| -> Result<Value, RpcError> {
            #[derive(Deserialize)]
            struct Params {
                word: String,
            }
            let params: Params = req.params()?;
            Ok(json!({ "echo": params.word }))
        })
    }

    #[test]
    fn test_dispatch_routes_by_channel_and_method() {
        let server = RpcServer::new();
        server.add_channel("svc", [("echo".to_string(), echo())]).unwrap();

        let req = RpcRequest::new("echo", &json!({"word": "hi"}), 7).unwrap();
        let rsp = server.dispatch("svc", &req);
        assert_eq!(rsp.id, Some(json!(7)));
        assert_eq!(rsp.into_result().unwrap(), json!({"echo": "hi"}));

        let err = server.dispatch("other", &req).into_result().unwrap_err();
        assert_eq!(err.code, RpcError::METHOD_NOT_FOUND);
    }

    #[test]
    fn test_invalid_params() {
        let server = RpcServer::new();
        server.add_channel("svc", [("echo".to_string(), echo())]).unwrap();

        let req = RpcRequest::new("echo", &json!({"nope": 1}), 1).unwrap();
        let err = server.dispatch("svc", &req).into_result().unwrap_err();
        assert_eq!(err, RpcError::invalid_params());
    }

    #[test]
    fn test_parse_error() {
        let server = RpcServer::new();
        let rsp = server.dispatch_bytes("svc", b"{not json");
        assert_eq!(rsp.into_result().unwrap_err().code, RpcError::PARSE_ERROR);
    }

    #[test]
    fn test_channel_taken() {
        let server = RpcServer::new();
        server.add_channel("svc", Vec::new()).unwrap();
        assert!(matches!(
            server.add_channel("svc", Vec::new()),
            Err(TransportError::ChannelTaken(_))
        ));
        assert!(server.remove_channel("svc"));
    }
}
