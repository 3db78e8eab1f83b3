//! HTTP gateway in front of the bus and the RPC router.
//!
//! # Routes
//! - `POST /bus/{channel}`: publish the raw body on a bus channel
//! - `GET  /bus/{channel}/ws`: stream a channel's payloads over WebSocket
//! - `POST /rpc/{channel}`: dispatch a JSON-RPC 2.0 request
//!
//! # Design Decisions
//! - Bind is separate from serve so a bind failure aborts startup before anything runs
//! - Request timeout and body limit applied to every route
//! - WebSocket streams end on the same shutdown signal as the server

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ListenerConfig;
use crate::lifecycle::shutdown::{Shutdown, ShutdownListener};
use crate::transport::bus::{Bus, Payload};
use crate::transport::rpc::RpcServer;
use crate::transport::TransportError;

/// State injected into gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub bus: Bus,
    pub rpc: Arc<RpcServer>,
    pub shutdown: Shutdown,
}

/// Build the gateway router with all middleware layers.
#[allow(deprecated)]
pub fn router(state: GatewayState, config: &ListenerConfig) -> Router {
    Router::new()
        .route("/bus/{channel}", post(publish_handler))
        .route("/bus/{channel}/ws", get(subscribe_handler))
        .route("/rpc/{channel}", post(rpc_handler))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(TraceLayer::new_for_http())
}

/// A bound, not yet serving, gateway.
pub struct Gateway {
    listener: TcpListener,
    router: Router,
    shutdown: ShutdownListener,
}

impl Gateway {
    /// Bind the listener. Serving starts with [`Gateway::serve`].
    pub async fn bind(config: &ListenerConfig, state: GatewayState) -> Result<Self, TransportError> {
        let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
            TransportError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;

        let listener = TcpListener::bind(addr).await.map_err(TransportError::Bind)?;
        let shutdown = state.shutdown.subscribe();

        tracing::info!(address = %listener.local_addr().map_err(TransportError::Bind)?, "Gateway bound");

        Ok(Self {
            listener,
            router: router(state, config),
            shutdown,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener.local_addr().map_err(TransportError::Bind)
    }

    /// Serve until the shutdown signal fires.
    pub async fn serve(self) -> Result<(), TransportError> {
        let Self {
            listener,
            router,
            mut shutdown,
        } = self;

        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.recv().await })
            .await
            .map_err(TransportError::Serve)?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

async fn publish_handler(
    State(state): State<GatewayState>,
    Path(channel): Path<String>,
    body: Bytes,
) -> StatusCode {
    let reached = state.bus.publish(&channel, body.to_vec());
    tracing::debug!(channel = %channel, reached, "Published via gateway");
    StatusCode::ACCEPTED
}

async fn rpc_handler(
    State(state): State<GatewayState>,
    Path(channel): Path<String>,
    body: Bytes,
) -> Response {
    Json(state.rpc.dispatch_bytes(&channel, &body)).into_response()
}

async fn subscribe_handler(
    State(state): State<GatewayState>,
    Path(channel): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let rx = state.bus.subscribe(&channel);
    let shutdown = state.shutdown.subscribe();
    ws.on_upgrade(move |socket| forward(socket, rx, shutdown, channel))
}

async fn forward(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<Payload>,
    mut shutdown: ShutdownListener,
    channel: String,
) {
    tracing::debug!(channel = %channel, "WebSocket subscriber attached");

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            msg = rx.recv() => match msg {
                Ok(payload) => {
                    if socket.send(Message::Binary(payload.to_vec().into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(channel = %channel, skipped, "WebSocket subscriber lagging");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    let _ = socket.send(Message::Close(None)).await;
    tracing::debug!(channel = %channel, "WebSocket subscriber detached");
}
