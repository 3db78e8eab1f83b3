//! Messaging and RPC substrate.
//!
//! # Data Flow
//! ```text
//! HTTP client ─► http.rs ─► POST /bus/{channel} ─► bus.rs ─► listeners (heartbeat handler)
//!                        └► POST /rpc/{channel} ─► rpc.rs ─► method handlers (queries)
//!
//! bus.rs publish ─► broadcast ─► GET /bus/{channel}/ws subscribers (notices)
//! ```
//!
//! # Design Decisions
//! - The core engines only see `Bus` and `RpcServer`; HTTP is one adapter over them
//! - Payloads are opaque bytes; encoding is the caller's concern

pub mod bus;
pub mod http;
pub mod rpc;

use thiserror::Error;

pub use bus::Bus;
pub use http::{Gateway, GatewayState};
pub use rpc::{RpcError, RpcHandler, RpcRequest, RpcResponse, RpcServer};

/// Errors raised by the transport substrate.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind: {0}")]
    Bind(std::io::Error),

    #[error("server error: {0}")]
    Serve(std::io::Error),

    #[error("rpc channel {0} is already registered")]
    ChannelTaken(String),
}
