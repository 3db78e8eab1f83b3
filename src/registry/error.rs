//! Registry error definitions.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced by the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Query for a name the registry does not track.
    #[error("service name does not exist")]
    NotFound(String),

    /// Malformed RPC parameters.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Heartbeat payload could not be decoded.
    #[error("malformed status report: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("registry must be started inside a Tokio runtime")]
    NoRuntime,
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_is_stable() {
        let err = RegistryError::NotFound("alpha".into());
        assert_eq!(err.to_string(), "service name does not exist");
    }
}
