//! Daemon run sequence.
//!
//! The daemon is driven by a two-state machine: `serving` while traffic is
//! accepted, `stopping` once a termination signal arrives. The stopping
//! action halts the sweep and closes the gateway; the machine's shutdown
//! returns once that action has run.

use std::sync::Arc;

use crate::config::LifecycleConfig;
use crate::lifecycle::shutdown::Shutdown;
use crate::machine::{MachineError, State, StateMachine};
use crate::registry::RegistryManager;

pub const SERVING: &str = "serving";
pub const STOPPING: &str = "stopping";

/// Ticks between `serving` heartbeats in the log.
const SERVING_TICKS: u64 = 100;

/// Build (but do not start) the daemon's lifecycle machine.
pub fn lifecycle_machine(
    registry: Arc<RegistryManager>,
    gateway: Shutdown,
    config: &LifecycleConfig,
) -> Result<StateMachine, MachineError> {
    let mut machine = StateMachine::new("registryd", config.precision());

    let observed = registry.clone();
    let serving = State::new(SERVING)
        .with_ticks(SERVING_TICKS)
        .with_action(move || {
            tracing::debug!(services = observed.count(), "Serving");
        });

    let stopping = State::new(STOPPING).with_bound_action((registry, gateway), |(registry, gateway)| {
        registry.stop();
        gateway.trigger();
    });

    machine.register_states([serving, stopping])?;
    machine.set_starting_state(SERVING)?;
    machine.set_stopping_state(STOPPING)?;
    Ok(machine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistrySettings;
    use crate::transport::Bus;
    use std::time::Duration;

    fn registry() -> Arc<RegistryManager> {
        Arc::new(RegistryManager::new(
            RegistrySettings::default(),
            Arc::new(Bus::default()),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_machine_starts_serving() {
        let machine =
            lifecycle_machine(registry(), Shutdown::new(), &LifecycleConfig::default()).unwrap();
        machine.start().unwrap();

        assert_eq!(machine.current_state().as_deref(), Some(SERVING));
        machine.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_gateway() {
        let gateway = Shutdown::new();
        let machine =
            lifecycle_machine(registry(), gateway.clone(), &LifecycleConfig::default()).unwrap();
        machine.start().unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!gateway.is_triggered());

        machine.shutdown().await.unwrap();

        assert!(gateway.is_triggered());
        assert_eq!(machine.current_state().as_deref(), Some(STOPPING));
    }
}
