//! Service liveness registry.
//!
//! # Data Flow
//! ```text
//! Heartbeat (STATUS_CHANNEL):
//!     payload → engine.rs handle_payload (malformed → log, drop)
//!     → store.rs update / register
//!     → notify.rs on state or readiness change
//!     → removed when the report says Stopped
//!
//! Sweep (every sweep period):
//!     Offline and dead      → purge
//!     not Offline, timed out → force Offline → notify
//!
//! Queries (INFO_CHANNEL, rpc.rs):
//!     query_status / query_status_list → store snapshots
//! ```
//!
//! # Design Decisions
//! - The store is owned by the engine instance; several registries may coexist
//! - Timing is read from an injected clock
//! - Per-report interval/threshold overrides are sticky: zero keeps the current value

pub mod clock;
pub mod engine;
pub mod entry;
pub mod error;
pub mod notify;
pub mod rpc;
pub mod status;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::RegistryManager;
pub use error::{RegistryError, RegistryResult};
pub use notify::{Notifier, Transition};
pub use status::{
    QueryStatusListReq, QueryStatusListRsp, QueryStatusReq, QueryStatusRsp, ServiceStatus, State,
    StatusList,
};

/// Bus channel carrying heartbeat reports.
pub const STATUS_CHANNEL: &str = "service.status";
/// Bus channel carrying transition notices.
pub const NOTICE_CHANNEL: &str = "service.notice";
/// RPC channel exposing the query methods.
pub const INFO_CHANNEL: &str = "service.info";

pub const QUERY_STATUS: &str = "query_status";
pub const QUERY_STATUS_LIST: &str = "query_status_list";
