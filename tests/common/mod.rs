//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use service_registry::config::RegistrySettings;
use service_registry::registry::{ManualClock, Notifier, RegistryManager, Transition};

/// Notifier that keeps every transition it sees.
#[derive(Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Transition>>,
}

impl RecordingNotifier {
    pub fn transitions(&self) -> Vec<Transition> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, transition: &Transition) {
        self.seen.lock().unwrap().push(transition.clone());
    }
}

/// Settings with a 1s interval, 3 tolerated failures and a purge delay of 2.
pub fn settings() -> RegistrySettings {
    RegistrySettings {
        check_interval_secs: 1,
        allow_failures: 3,
        purge_delay: 2,
        sweep_period_ms: 100,
    }
}

/// A registry on a manual clock at t=0, recording its notifications.
pub fn registry() -> (Arc<RegistryManager>, Arc<RecordingNotifier>, ManualClock) {
    let notifier = Arc::new(RecordingNotifier::default());
    let clock = ManualClock::from_millis(0);
    let registry = Arc::new(RegistryManager::with_clock(
        settings(),
        notifier.clone(),
        Arc::new(clock.clone()),
    ));
    (registry, notifier, clock)
}
