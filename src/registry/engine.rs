//! Registry health engine.
//!
//! # Responsibilities
//! - Register services on their first heartbeat, update them on later ones
//! - Notify on state/readiness changes
//! - Sweep periodically: force silent services offline, purge dead ones
//! - Answer status queries from store snapshots
//!
//! # Design Decisions
//! - Shard locks are released before any notification is emitted
//! - A report racing the sweep is last-write-wins; a purged service re-registers on its next report
//! - The only revival path is a fresh report

use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::RegistrySettings;
use crate::lifecycle::shutdown::{Shutdown, ShutdownListener};
use crate::observability::metrics;
use crate::registry::clock::{Clock, SystemClock};
use crate::registry::entry::RegistryEntry;
use crate::registry::error::{RegistryError, RegistryResult};
use crate::registry::notify::{Notifier, Transition};
use crate::registry::rpc;
use crate::registry::status::{ServiceStatus, State};
use crate::registry::store::EntryStore;
use crate::registry::{INFO_CHANNEL, STATUS_CHANNEL};
use crate::transport::{Bus, RpcServer};

/// Tracks service liveness from heartbeat reports.
pub struct RegistryManager {
    settings: RegistrySettings,
    store: EntryStore,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    shutdown: Shutdown,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl RegistryManager {
    /// Create a registry on the system clock.
    pub fn new(settings: RegistrySettings, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_clock(settings, notifier, Arc::new(SystemClock))
    }

    pub fn with_clock(
        settings: RegistrySettings,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        tracing::info!(
            interval_ms = settings.interval_ms(),
            allow_failures = settings.allow_failures,
            purge_delay = settings.purge_delay,
            sweep_period_ms = settings.sweep_period_ms,
            "Registry manager created"
        );

        Self {
            settings,
            store: EntryStore::new(),
            notifier,
            clock,
            shutdown: Shutdown::new(),
            sweeper: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Expose the query methods, listen for heartbeats and arm the sweep.
    ///
    /// Nothing is started if the query channel cannot be registered.
    pub fn startup(self: &Arc<Self>, bus: &Bus, rpc_server: &RpcServer) -> RegistryResult<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| RegistryError::NoRuntime)?;

        rpc_server.add_channel(INFO_CHANNEL, rpc::methods(Arc::downgrade(self)))?;

        let registry = Arc::downgrade(self);
        bus.listen(STATUS_CHANNEL, move |data| {
            if let Some(registry) = registry.upgrade() {
                registry.handle_payload(data);
            }
        });

        let handle = runtime.spawn(self.clone().run_sweeper(self.shutdown.subscribe()));
        if let Ok(mut sweeper) = self.sweeper.lock() {
            *sweeper = Some(handle);
        }

        tracing::info!("Registry manager started");
        Ok(())
    }

    /// Signal the sweep loop to stop without waiting for it.
    pub fn stop(&self) {
        self.shutdown.trigger();
    }

    /// Stop the sweep loop and wait for it to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self.sweeper.lock().ok().and_then(|mut sweeper| sweeper.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Sweep loop failed");
            }
        }
        tracing::info!("Registry manager shutdown");
    }

    async fn run_sweeper(self: Arc<Self>, mut shutdown: ShutdownListener) {
        let period = self.settings.sweep_period();
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Sweep loop received shutdown signal, exiting");
                    break;
                }
                _ = time::sleep(period) => self.sweep(),
            }
        }
    }

    /// Decode and apply a raw heartbeat. Malformed payloads are logged and dropped.
    pub fn handle_payload(&self, data: &[u8]) {
        match decode_status(data) {
            Ok(status) => self.handle_status(status),
            Err(e) => {
                metrics::record_malformed_report();
                tracing::error!(error = %e, "Dropping malformed status report");
            }
        }
    }

    /// Apply a heartbeat report.
    pub fn handle_status(&self, status: ServiceStatus) {
        metrics::record_heartbeat();
        let now = self.clock.now_ms();

        let outcome = self.store.update(&status.name, |entry| {
            let previous = entry.to_status();
            let changed = entry.changed_by(&status);
            entry.apply(&status, now);
            (changed.then_some(previous), entry.state == State::Stopped)
        });

        let Some((previous, stopped)) = outcome else {
            self.register(&status, now);
            return;
        };

        if let Some(previous) = previous {
            self.emit(&Transition {
                previous,
                current: status.clone(),
            });
        }

        if stopped && self.store.remove_if(&status.name, |e| e.state == State::Stopped) {
            tracing::info!(service = %status.name, "Service unregistered");
        }
    }

    fn register(&self, status: &ServiceStatus, now: u64) {
        if status.state == State::Stopped {
            tracing::debug!(service = %status.name, "Ignoring stop report from unknown service");
            return;
        }

        self.store
            .insert(RegistryEntry::register(status, &self.settings, now));
        tracing::info!(service = %status.name, state = %status.state, "Service registered");
    }

    /// Point-in-time snapshot of one service.
    pub fn query_status(&self, name: &str) -> RegistryResult<ServiceStatus> {
        self.store
            .snapshot(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Snapshots of all services, or of those named in `observed` when non-empty.
    pub fn query_status_list(&self, observed: Option<&[String]>) -> Vec<ServiceStatus> {
        let all = self.store.snapshots();
        match observed {
            Some(names) if !names.is_empty() => names
                .iter()
                .flat_map(|name| all.iter().filter(move |s| &s.name == name).cloned())
                .collect(),
            _ => all,
        }
    }

    pub fn registered(&self, name: &str) -> bool {
        self.store.contains(name)
    }

    pub fn count(&self) -> usize {
        self.store.len()
    }

    /// One timeout pass over every entry.
    pub fn sweep(&self) {
        let now = self.clock.now_ms();
        let mut transitions = Vec::new();

        self.store.retain(|entry| {
            if entry.state == State::Offline {
                if entry.dead(now) {
                    tracing::info!(service = %entry.name, "Purging dead service");
                    metrics::record_purge();
                    return false;
                }
                return true;
            }

            if entry.timed_out(now) {
                let previous = entry.to_status();
                entry.force_offline(now);
                tracing::info!(service = %entry.name, "Forcing service offline");
                transitions.push(Transition {
                    previous,
                    current: entry.to_status(),
                });
            }
            true
        });

        metrics::record_registry_size(self.store.len());

        for transition in &transitions {
            self.emit(transition);
        }
    }

    fn emit(&self, transition: &Transition) {
        tracing::info!(
            service = %transition.current.name,
            from = %transition.previous.state,
            to = %transition.current.state,
            ready = transition.current.ready,
            "Service state changed"
        );
        metrics::record_transition(
            transition.previous.state.as_str(),
            transition.current.state.as_str(),
        );
        self.notifier.notify(transition);
    }
}

fn decode_status(data: &[u8]) -> RegistryResult<ServiceStatus> {
    let status: ServiceStatus = serde_json::from_slice(data)?;
    if status.name.is_empty() {
        return Err(RegistryError::InvalidParameters("empty service name".into()));
    }
    Ok(status)
}
