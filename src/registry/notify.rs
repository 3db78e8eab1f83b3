//! Transition notifications.

use crate::registry::status::ServiceStatus;
use crate::registry::NOTICE_CHANNEL;
use crate::transport::Bus;

/// A change in a tracked service's state or readiness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Snapshot before the change.
    pub previous: ServiceStatus,
    /// The incoming report, or the forced-offline snapshot.
    pub current: ServiceStatus,
}

/// Outbound seam for transition notices.
///
/// Called from the report path and the sweep; implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, transition: &Transition);
}

/// Publishes the resulting status as JSON on the notice channel.
impl Notifier for Bus {
    fn notify(&self, transition: &Transition) {
        match serde_json::to_vec(&transition.current) {
            Ok(payload) => {
                self.publish(NOTICE_CHANNEL, payload);
            }
            Err(e) => {
                tracing::error!(service = %transition.current.name, error = %e, "Failed to encode notice");
            }
        }
    }
}
