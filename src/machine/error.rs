//! State machine error definitions.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`StateMachine`](super::StateMachine) operations.
///
/// All of them leave the machine in its prior valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    /// Descriptor rejected at registration (empty name).
    #[error("state machine [{machine}] rejected an unnamed state")]
    InvalidState { machine: String },

    /// The named state was never registered.
    #[error("state machine [{machine}] has no state named {state:?}")]
    UnknownState { machine: String, state: String },

    #[error("state machine [{0}] has no states registered")]
    NoStates(String),

    #[error("state machine [{0}] has no starting state")]
    NoStartingState(String),

    /// Configuration attempted, or start repeated, after the loop was spawned.
    #[error("state machine [{0}] is already started")]
    AlreadyStarted(String),

    #[error("state machine [{0}] is not started")]
    NotStarted(String),

    #[error("state machine [{0}] must be started inside a Tokio runtime")]
    NoRuntime(String),

    #[error("state machine [{0}] has no saved state")]
    NoSavedState(String),

    /// The stopping state did not acknowledge within the bounded wait.
    #[error("state machine [{machine}] stop not acknowledged within {limit:?}")]
    StopTimeout { machine: String, limit: Duration },
}
