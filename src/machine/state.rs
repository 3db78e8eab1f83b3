//! State descriptors.
//!
//! A [`State`] pairs a name with a tick threshold and an optional action.
//! The machine's trigger loop calls [`State::tick`] once per precision period
//! while the state is current; the action runs when the threshold is met.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Action executed when a state's tick threshold is reached.
pub type Action = Arc<dyn Fn() + Send + Sync>;

/// A named state of a [`StateMachine`](super::StateMachine).
pub struct State {
    name: String,
    /// 0 fires every tick, N fires every Nth tick.
    ticks: u64,
    action: Option<Action>,
    tick_count: AtomicU64,
}

impl State {
    /// Create a state that fires every tick and has no action.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ticks: 0,
            action: None,
            tick_count: AtomicU64::new(0),
        }
    }

    /// Fire the action only every `ticks` ticks. 0 means every tick.
    pub fn with_ticks(mut self, ticks: u64) -> Self {
        self.ticks = ticks;
        self
    }

    pub fn with_action<F>(mut self, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.action = Some(Arc::new(action));
        self
    }

    /// Bind `args` to the action; each firing calls `action(&args)`.
    pub fn with_bound_action<A, F>(self, args: A, action: F) -> Self
    where
        A: Send + Sync + 'static,
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.with_action(move || action(&args))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Ticks counted since registration.
    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::Relaxed)
    }

    pub(crate) fn reset(&self) {
        self.tick_count.store(0, Ordering::Relaxed);
    }

    /// Count one tick. Returns the new count when the action is due.
    pub(crate) fn tick(&self) -> Option<u64> {
        let count = self.tick_count.fetch_add(1, Ordering::Relaxed) + 1;
        if self.ticks == 0 || count % self.ticks == 0 {
            Some(count)
        } else {
            None
        }
    }

    pub(crate) fn run_action(&self) {
        if let Some(action) = &self.action {
            action();
        }
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("name", &self.name)
            .field("ticks", &self.ticks)
            .field("has_action", &self.action.is_some())
            .field("tick_count", &self.tick_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_zero_threshold_fires_every_tick() {
        let state = State::new("a");
        assert_eq!(state.tick(), Some(1));
        assert_eq!(state.tick(), Some(2));
        assert_eq!(state.tick_count(), 2);
    }

    #[test]
    fn test_threshold_fires_every_nth_tick() {
        let state = State::new("a").with_ticks(3);
        let fired: Vec<_> = (0..7).filter_map(|_| state.tick()).collect();
        assert_eq!(fired, vec![3, 6]);
    }

    #[test]
    fn test_bound_action_receives_args() {
        let hits = Arc::new(AtomicUsize::new(0));
        let state = State::new("a").with_bound_action(hits.clone(), |hits| {
            hits.fetch_add(2, Ordering::SeqCst);
        });
        state.run_action();
        state.run_action();
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_reset_clears_counter() {
        let state = State::new("a");
        state.tick();
        state.reset();
        assert_eq!(state.tick_count(), 0);
    }
}
