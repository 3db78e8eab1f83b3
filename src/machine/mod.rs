//! Tick-driven state machine subsystem.
//!
//! # Data Flow
//! ```text
//! Setup (single owner, before start):
//!     register_state → set_starting_state → set_stopping_state
//!
//! Running (any task):
//!     move_to_state / pause / resume / save_state / restore_state
//!
//! Trigger loop (engine.rs, one task per machine):
//!     every precision tick → current state's counter++ → action when due
//!     → stopping state's action done → stop acknowledged
//!
//! Shutdown:
//!     move to stopping state → wait for acknowledgement → cancel loop
//! ```
//!
//! # Design Decisions
//! - Validity of a move is membership only, no transition table
//! - Actions never overlap: a slow action delays following ticks
//! - Setup methods take `&mut self`, so they cannot race a shared, running machine

pub mod engine;
pub mod error;
pub mod state;

pub use engine::StateMachine;
pub use error::MachineError;
pub use state::{Action, State};
