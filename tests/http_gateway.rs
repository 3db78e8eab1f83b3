//! End-to-end requests through the gateway router.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use service_registry::config::{ListenerConfig, RegistrySettings};
use service_registry::lifecycle::Shutdown;
use service_registry::registry::{RegistryManager, ServiceStatus, State, NOTICE_CHANNEL};
use service_registry::transport::http::router;
use service_registry::transport::{Bus, GatewayState, RpcError, RpcResponse, RpcServer};

struct Harness {
    app: Router,
    bus: Bus,
    registry: Arc<RegistryManager>,
}

fn harness() -> Harness {
    let bus = Bus::default();
    let rpc = Arc::new(RpcServer::new());
    let registry = Arc::new(RegistryManager::new(
        RegistrySettings::default(),
        Arc::new(bus.clone()),
    ));
    registry.startup(&bus, &rpc).unwrap();

    let app = router(
        GatewayState {
            bus: bus.clone(),
            rpc,
            shutdown: Shutdown::new(),
        },
        &ListenerConfig::default(),
    );

    Harness { app, bus, registry }
}

fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn rpc(app: &Router, body: Value) -> RpcResponse {
    let response = app
        .clone()
        .oneshot(post("/rpc/service.info", body.to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn report(app: &Router, status: &ServiceStatus) {
    let response = app
        .clone()
        .oneshot(post(
            "/bus/service.status",
            serde_json::to_vec(status).unwrap(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_heartbeat_then_query() {
    let h = harness();
    report(&h.app, &ServiceStatus::new("alpha", State::Online).with_ready(true)).await;
    assert!(h.registry.registered("alpha"));

    let response = rpc(
        &h.app,
        json!({"jsonrpc": "2.0", "method": "query_status", "params": {"name": "alpha"}, "id": 7}),
    )
    .await;

    assert_eq!(response.id, Some(json!(7)));
    let result = response.into_result().unwrap();
    assert_eq!(result["status"]["name"], "alpha");
    assert_eq!(result["status"]["state"], "online");
    assert_eq!(result["status"]["ready"], true);

    h.registry.shutdown().await;
}

#[tokio::test]
async fn test_query_unknown_service() {
    let h = harness();

    let error = rpc(
        &h.app,
        json!({"jsonrpc": "2.0", "method": "query_status", "params": {"name": "ghost"}, "id": 1}),
    )
    .await
    .into_result()
    .unwrap_err();

    assert_eq!(error.code, RpcError::SERVER_INVALID);
    assert_eq!(error.message, "service name does not exist");

    h.registry.shutdown().await;
}

#[tokio::test]
async fn test_query_list_with_and_without_whitelist() {
    let h = harness();
    report(&h.app, &ServiceStatus::new("alpha", State::Online)).await;
    report(&h.app, &ServiceStatus::new("beta", State::Starting)).await;

    let all = rpc(
        &h.app,
        json!({"jsonrpc": "2.0", "method": "query_status_list", "id": 1}),
    )
    .await
    .into_result()
    .unwrap();
    assert_eq!(all["list"]["services"].as_array().unwrap().len(), 2);

    let some = rpc(
        &h.app,
        json!({
            "jsonrpc": "2.0",
            "method": "query_status_list",
            "params": {"observed": ["beta", "missing"]},
            "id": 2
        }),
    )
    .await
    .into_result()
    .unwrap();
    let services = some["list"]["services"].as_array().unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0]["name"], "beta");

    h.registry.shutdown().await;
}

#[tokio::test]
async fn test_rpc_errors() {
    let h = harness();

    let bad_params = rpc(
        &h.app,
        json!({"jsonrpc": "2.0", "method": "query_status", "params": {"name": 5}, "id": 1}),
    )
    .await
    .into_result()
    .unwrap_err();
    assert_eq!(bad_params.code, RpcError::INVALID_PARAMS);

    let unknown = rpc(
        &h.app,
        json!({"jsonrpc": "2.0", "method": "restart", "id": 2}),
    )
    .await
    .into_result()
    .unwrap_err();
    assert_eq!(unknown.code, RpcError::METHOD_NOT_FOUND);

    let response = h
        .app
        .clone()
        .oneshot(post("/rpc/service.info", "{not json"))
        .await
        .unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: RpcResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed.into_result().unwrap_err().code, RpcError::PARSE_ERROR);

    h.registry.shutdown().await;
}

#[tokio::test]
async fn test_transition_published_on_notice_channel() {
    let h = harness();
    let mut notices = h.bus.subscribe(NOTICE_CHANNEL);

    report(&h.app, &ServiceStatus::new("alpha", State::Starting)).await;
    report(&h.app, &ServiceStatus::new("alpha", State::Online).with_ready(true)).await;

    let payload = notices.recv().await.unwrap();
    let notice: ServiceStatus = serde_json::from_slice(&payload).unwrap();
    assert_eq!(notice.name, "alpha");
    assert_eq!(notice.state, State::Online);
    assert!(notice.ready);

    h.registry.shutdown().await;
}

#[tokio::test]
async fn test_malformed_heartbeat_is_accepted_and_dropped() {
    let h = harness();

    report_raw(&h.app, "garbage").await;
    assert_eq!(h.registry.count(), 0);

    h.registry.shutdown().await;
}

async fn report_raw(app: &Router, body: &'static str) {
    let response = app
        .clone()
        .oneshot(post("/bus/service.status", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}
