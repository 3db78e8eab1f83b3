//! Query method handlers exposed on the info channel.

use serde_json::Value;
use std::sync::{Arc, Weak};

use crate::registry::engine::RegistryManager;
use crate::registry::error::RegistryError;
use crate::registry::status::{
    QueryStatusListReq, QueryStatusListRsp, QueryStatusReq, QueryStatusRsp, StatusList,
};
use crate::registry::{QUERY_STATUS, QUERY_STATUS_LIST};
use crate::transport::rpc::{RpcError, RpcHandler, RpcRequest};

/// Handlers for the registry's query methods.
///
/// They hold a weak reference so the RPC router does not keep the registry alive.
pub fn methods(registry: Weak<RegistryManager>) -> Vec<(String, RpcHandler)> {
    let single = registry.clone();
    let list = registry;

    vec![
        (
            QUERY_STATUS.to_string(),
            Arc::new(move |req: &RpcRequest| with_registry(&single, |r| query_status(r, req)))
                as RpcHandler,
        ),
        (
            QUERY_STATUS_LIST.to_string(),
            Arc::new(move |req: &RpcRequest| with_registry(&list, |r| query_status_list(r, req)))
                as RpcHandler,
        ),
    ]
}

fn with_registry(
    registry: &Weak<RegistryManager>,
    f: impl FnOnce(&RegistryManager) -> Result<Value, RpcError>,
) -> Result<Value, RpcError> {
    match registry.upgrade() {
        Some(registry) => f(&registry),
        None => Err(RpcError::server_invalid("registry is shut down")),
    }
}

pub fn query_status(registry: &RegistryManager, req: &RpcRequest) -> Result<Value, RpcError> {
    let params: QueryStatusReq = req.params()?;

    let status = registry.query_status(&params.name).map_err(to_rpc_error)?;
    encode(&QueryStatusRsp { status })
}

pub fn query_status_list(registry: &RegistryManager, req: &RpcRequest) -> Result<Value, RpcError> {
    let params: QueryStatusListReq = req.params()?;

    let services = registry.query_status_list(params.observed.as_deref());
    encode(&QueryStatusListRsp {
        list: StatusList { services },
    })
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::server_invalid(e.to_string()))
}

fn to_rpc_error(err: RegistryError) -> RpcError {
    match err {
        RegistryError::NotFound(_) => RpcError::server_invalid(err.to_string()),
        RegistryError::InvalidParameters(_) => RpcError::invalid_params(),
        other => RpcError::server_invalid(other.to_string()),
    }
}
