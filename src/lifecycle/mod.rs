//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Run sequence (sequence.rs):
//!     start → serving ─(signal)→ stopping → registry sweep stopped, gateway closed
//!
//! Shutdown (shutdown.rs):
//!     trigger → every listener's recv() resolves, including late subscribers
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → move the run sequence to stopping
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config, logging, gateway bind, registry, run sequence
//! - Ordered shutdown: stopping action, sweep join, gateway drain
//! - Shutdown has an optional timeout from config

pub mod sequence;
pub mod shutdown;
pub mod signals;

pub use sequence::lifecycle_machine;
pub use shutdown::{Shutdown, ShutdownListener};
