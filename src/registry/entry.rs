//! Per-service health record.
//!
//! # Timing rules
//! ```text
//! timed out:  now - update_time  > interval × threshold    (not yet Offline)
//! dead:       now - offline_time > interval × purge_delay  (Offline)
//! ```
//!
//! All times are wall-clock milliseconds.

use crate::config::RegistrySettings;
use crate::registry::status::{ServiceStatus, State};

/// Health record owned by the registry for one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub name: String,
    pub domain: i32,
    pub state: State,
    pub ready: bool,
    pub online_time: u64,
    pub offline_time: u64,
    /// Last accepted report or forced transition.
    pub update_time: u64,
    /// Heartbeat period in milliseconds.
    pub interval: u64,
    /// Missed intervals tolerated.
    pub threshold: u64,
    /// Intervals to keep an Offline entry before purging it.
    pub purge_delay: u64,
}

fn or_default(value: u64, default: u64) -> u64 {
    if value == 0 {
        default
    } else {
        value
    }
}

impl RegistryEntry {
    /// Seed a new entry from a first report, falling back to the defaults.
    pub fn register(status: &ServiceStatus, defaults: &RegistrySettings, now: u64) -> Self {
        Self {
            name: status.name.clone(),
            domain: status.domain,
            state: status.state,
            ready: status.ready,
            online_time: now,
            offline_time: if status.state == State::Offline { now } else { 0 },
            update_time: now,
            interval: or_default(u64::from(status.check_interval) * 1000, defaults.interval_ms()),
            threshold: or_default(u64::from(status.allow_failures), defaults.allow_failures),
            purge_delay: defaults.purge_delay,
        }
    }

    /// True if the report differs in state or readiness.
    pub fn changed_by(&self, status: &ServiceStatus) -> bool {
        self.state != status.state || self.ready != status.ready
    }

    /// Overwrite with an accepted report.
    ///
    /// Interval and threshold only change when the report carries non-zero values.
    pub fn apply(&mut self, status: &ServiceStatus, now: u64) {
        if status.check_interval != 0 {
            self.interval = u64::from(status.check_interval) * 1000;
        }
        if status.allow_failures != 0 {
            self.threshold = u64::from(status.allow_failures);
        }

        match (self.state, status.state) {
            (from, State::Offline) if from != State::Offline => self.offline_time = now,
            (from, State::Online) if from != State::Online => self.online_time = now,
            _ => {}
        }

        self.state = status.state;
        self.ready = status.ready;
        self.update_time = self.update_time.max(now);
    }

    pub fn timed_out(&self, now: u64) -> bool {
        now.saturating_sub(self.update_time) > self.interval.saturating_mul(self.threshold)
    }

    pub fn dead(&self, now: u64) -> bool {
        now.saturating_sub(self.offline_time) > self.interval.saturating_mul(self.purge_delay)
    }

    /// Force the entry into Offline after missed heartbeats.
    pub fn force_offline(&mut self, now: u64) {
        self.state = State::Offline;
        self.ready = false;
        self.update_time = self.update_time.max(now);
        self.offline_time = now;
    }

    /// Point-in-time snapshot.
    pub fn to_status(&self) -> ServiceStatus {
        ServiceStatus {
            name: self.name.clone(),
            domain: self.domain,
            state: self.state,
            ready: self.ready,
            check_interval: 0,
            allow_failures: 0,
            time: self.update_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> RegistrySettings {
        RegistrySettings {
            check_interval_secs: 1,
            allow_failures: 3,
            purge_delay: 2,
            sweep_period_ms: 100,
        }
    }

    #[test]
    fn test_register_falls_back_to_defaults() {
        let entry = RegistryEntry::register(&ServiceStatus::new("a", State::Online), &defaults(), 10);
        assert_eq!(entry.interval, 1000);
        assert_eq!(entry.threshold, 3);
        assert_eq!(entry.purge_delay, 2);
        assert_eq!(entry.update_time, 10);
        assert_eq!(entry.online_time, 10);
    }

    #[test]
    fn test_register_uses_report_overrides() {
        let status = ServiceStatus::new("a", State::Online)
            .with_check_interval(4)
            .with_allow_failures(7);
        let entry = RegistryEntry::register(&status, &defaults(), 0);
        assert_eq!(entry.interval, 4000);
        assert_eq!(entry.threshold, 7);
    }

    #[test]
    fn test_apply_keeps_sticky_values_on_zero() {
        let status = ServiceStatus::new("a", State::Online).with_check_interval(4);
        let mut entry = RegistryEntry::register(&status, &defaults(), 0);

        entry.apply(&ServiceStatus::new("a", State::Online), 500);
        assert_eq!(entry.interval, 4000);
        assert_eq!(entry.threshold, 3);
        assert_eq!(entry.update_time, 500);

        entry.apply(&ServiceStatus::new("a", State::Online).with_allow_failures(9), 600);
        assert_eq!(entry.threshold, 9);
    }

    #[test]
    fn test_offline_time_set_once_per_episode() {
        let mut entry = RegistryEntry::register(&ServiceStatus::new("a", State::Online), &defaults(), 0);
        entry.apply(&ServiceStatus::new("a", State::Offline), 100);
        entry.apply(&ServiceStatus::new("a", State::Offline), 200);
        assert_eq!(entry.offline_time, 100);

        entry.apply(&ServiceStatus::new("a", State::Online), 300);
        assert_eq!(entry.online_time, 300);
        entry.apply(&ServiceStatus::new("a", State::Offline), 400);
        assert_eq!(entry.offline_time, 400);
    }

    #[test]
    fn test_timeout_and_dead_are_strict() {
        let mut entry = RegistryEntry::register(&ServiceStatus::new("a", State::Online), &defaults(), 0);
        assert!(!entry.timed_out(3000));
        assert!(entry.timed_out(3001));

        entry.force_offline(3001);
        assert_eq!(entry.state, State::Offline);
        assert!(!entry.ready);
        assert_eq!(entry.update_time, 3001);
        assert!(!entry.dead(5001));
        assert!(entry.dead(5002));
    }

    #[test]
    fn test_update_time_never_decreases() {
        let mut entry = RegistryEntry::register(&ServiceStatus::new("a", State::Online), &defaults(), 1000);
        entry.apply(&ServiceStatus::new("a", State::Online), 900);
        assert_eq!(entry.update_time, 1000);
    }
}
