//! Tick-driven state machine.
//!
//! # Responsibilities
//! - Hold the registered states and the current-state slot
//! - Run the current state's action on a fixed-precision trigger loop
//! - Make shutdown deterministic via the stopping state's acknowledgement
//!
//! # Design Decisions
//! - Transitions are explicit `move_to_state` calls; any registered state is reachable
//! - The current state lives in an `ArcSwapOption`, so reads never take a lock
//! - One background task per machine; actions run on it sequentially

use arc_swap::ArcSwapOption;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::lifecycle::shutdown::{Shutdown, ShutdownListener};
use crate::machine::error::MachineError;
use crate::machine::state::State;

/// State shared between the machine handle and its trigger loop.
struct Shared {
    name: String,
    current: ArcSwapOption<String>,
    saved: ArcSwapOption<String>,
    trace: AtomicBool,
    started: AtomicBool,
    paused: watch::Sender<bool>,
    stop_ack: watch::Sender<bool>,
    shutdown: Shutdown,
}

/// A deterministic finite automaton whose states run periodic actions.
///
/// Configure with [`register_state`](Self::register_state),
/// [`set_starting_state`](Self::set_starting_state) and
/// [`set_stopping_state`](Self::set_stopping_state), then [`start`](Self::start).
/// After start the machine may be shared (e.g. behind an `Arc`) and driven from any task.
pub struct StateMachine {
    states: HashMap<String, Arc<State>>,
    starting: Option<String>,
    stopping: Option<String>,
    precision: Duration,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl StateMachine {
    /// Create a machine whose trigger fires every `precision`.
    pub fn new(name: impl Into<String>, precision: Duration) -> Self {
        let (paused, _) = watch::channel(false);
        let (stop_ack, _) = watch::channel(false);
        Self {
            states: HashMap::new(),
            starting: None,
            stopping: None,
            precision,
            shared: Arc::new(Shared {
                name: name.into(),
                current: ArcSwapOption::empty(),
                saved: ArcSwapOption::empty(),
                trace: AtomicBool::new(false),
                started: AtomicBool::new(false),
                paused,
                stop_ack,
                shutdown: Shutdown::new(),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Enable or disable debug tracing of moves and action triggers.
    pub fn enable_trace(&self, on: bool) {
        self.shared.trace.store(on, Ordering::Relaxed);
    }

    /// Register a state, replacing any state with the same name.
    ///
    /// The state's tick counter is reset.
    pub fn register_state(&mut self, state: State) -> Result<(), MachineError> {
        self.ensure_configurable()?;

        if state.name().is_empty() {
            tracing::error!(machine = %self.name(), "Invalid state registration ignored");
            return Err(MachineError::InvalidState {
                machine: self.name().to_string(),
            });
        }

        state.reset();
        tracing::debug!(machine = %self.name(), state = %state.name(), "State registered");
        self.states.insert(state.name().to_string(), Arc::new(state));
        Ok(())
    }

    /// Register several states, stopping at the first invalid one.
    pub fn register_states<I>(&mut self, states: I) -> Result<(), MachineError>
    where
        I: IntoIterator<Item = State>,
    {
        states.into_iter().try_for_each(|s| self.register_state(s))
    }

    pub fn set_starting_state(&mut self, name: &str) -> Result<(), MachineError> {
        self.ensure_configurable()?;
        self.ensure_registered(name)?;
        self.starting = Some(name.to_string());
        Ok(())
    }

    pub fn set_stopping_state(&mut self, name: &str) -> Result<(), MachineError> {
        self.ensure_configurable()?;
        self.ensure_registered(name)?;
        self.stopping = Some(name.to_string());
        Ok(())
    }

    /// Look up a registered state.
    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.get(name).map(Arc::as_ref)
    }

    /// Name of the current state, if any.
    pub fn current_state(&self) -> Option<String> {
        self.shared.current.load().as_deref().cloned()
    }

    pub fn is_started(&self) -> bool {
        self.shared.started.load(Ordering::SeqCst)
    }

    /// Move to the named state. Moving to the current state is a no-op.
    pub fn move_to_state(&self, name: &str) -> Result<(), MachineError> {
        let from = self.current_state();

        if from.as_deref() == Some(name) {
            tracing::trace!(machine = %self.name(), state = %name, "Already in state");
            return Ok(());
        }

        if !self.states.contains_key(name) {
            tracing::error!(machine = %self.name(), state = %name, "State not found");
            return Err(self.unknown(name));
        }

        if self.shared.trace.load(Ordering::Relaxed) {
            tracing::debug!(machine = %self.name(), from = ?from, to = %name, "Moving state");
        }

        self.shared.current.store(Some(Arc::new(name.to_string())));
        Ok(())
    }

    /// Remember the current state for a later [`restore_state`](Self::restore_state).
    pub fn save_state(&self) {
        self.shared.saved.store(self.shared.current.load_full());
    }

    /// Move back to the most recently saved state.
    pub fn restore_state(&self) -> Result<(), MachineError> {
        match self.shared.saved.load_full() {
            Some(saved) => self.move_to_state(&saved),
            None => Err(MachineError::NoSavedState(self.name().to_string())),
        }
    }

    /// Suspend the trigger. State and tick counters are kept.
    pub fn pause(&self) {
        self.shared.paused.send_replace(true);
    }

    /// Resume the trigger; the next tick fires one precision period from now.
    pub fn resume(&self) {
        self.shared.paused.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.shared.paused.borrow()
    }

    /// Start the trigger loop on a background task.
    ///
    /// Moves to the starting state unless a current state was already set.
    pub fn start(&self) -> Result<(), MachineError> {
        if self.states.is_empty() {
            tracing::error!(machine = %self.name(), "No states registered, cannot start");
            return Err(MachineError::NoStates(self.name().to_string()));
        }

        let starting = self.starting.as_deref().ok_or_else(|| {
            tracing::error!(machine = %self.name(), "No starting state");
            MachineError::NoStartingState(self.name().to_string())
        })?;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| MachineError::NoRuntime(self.name().to_string()))?;

        if self.shared.started.swap(true, Ordering::SeqCst) {
            return Err(MachineError::AlreadyStarted(self.name().to_string()));
        }

        if self.current_state().is_none() {
            self.move_to_state(starting)?;
        }

        let trigger = Trigger {
            shared: self.shared.clone(),
            states: self.states.clone(),
            stopping: self.stopping.clone(),
        };
        let handle = runtime.spawn(trigger.run(
            self.precision,
            self.shared.shutdown.subscribe(),
            self.shared.paused.subscribe(),
        ));

        if let Ok(mut worker) = self.worker.lock() {
            *worker = Some(handle);
        }

        tracing::info!(machine = %self.name(), precision = ?self.precision, "State machine started");
        Ok(())
    }

    /// Stop the machine.
    ///
    /// With a stopping state configured, moves there and waits, without a bound,
    /// until its action has run. Then cancels the trigger loop.
    pub async fn shutdown(&self) -> Result<(), MachineError> {
        self.shutdown_inner(None).await
    }

    /// Like [`shutdown`](Self::shutdown) but gives up waiting after `limit`.
    ///
    /// The trigger loop is cancelled either way.
    pub async fn shutdown_timeout(&self, limit: Duration) -> Result<(), MachineError> {
        self.shutdown_inner(Some(limit)).await
    }

    async fn shutdown_inner(&self, limit: Option<Duration>) -> Result<(), MachineError> {
        if !self.is_started() {
            return Err(MachineError::NotStarted(self.name().to_string()));
        }

        tracing::info!(machine = %self.name(), "State machine exiting");

        let mut result = Ok(());
        if let Some(stopping) = &self.stopping {
            let mut ack = self.shared.stop_ack.subscribe();
            self.move_to_state(stopping)?;

            let acked = ack.wait_for(|acked| *acked);
            match limit {
                None => {
                    let _ = acked.await;
                }
                Some(limit) => {
                    if time::timeout(limit, acked).await.is_err() {
                        tracing::warn!(machine = %self.name(), ?limit, "Stop not acknowledged in time");
                        result = Err(MachineError::StopTimeout {
                            machine: self.name().to_string(),
                            limit,
                        });
                    }
                }
            }
        }

        self.shared.shutdown.trigger();
        let handle = self.worker.lock().ok().and_then(|mut worker| worker.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(machine = %self.name(), error = %e, "Trigger loop failed");
            }
        }

        tracing::info!(machine = %self.name(), "State machine exited");
        result
    }

    fn ensure_configurable(&self) -> Result<(), MachineError> {
        if self.is_started() {
            return Err(MachineError::AlreadyStarted(self.name().to_string()));
        }
        Ok(())
    }

    fn ensure_registered(&self, name: &str) -> Result<(), MachineError> {
        if self.states.contains_key(name) {
            Ok(())
        } else {
            tracing::error!(machine = %self.name(), state = %name, "State is not registered");
            Err(self.unknown(name))
        }
    }

    fn unknown(&self, name: &str) -> MachineError {
        MachineError::UnknownState {
            machine: self.name().to_string(),
            state: name.to_string(),
        }
    }
}

/// The trigger loop's view of the machine.
struct Trigger {
    shared: Arc<Shared>,
    states: HashMap<String, Arc<State>>,
    stopping: Option<String>,
}

impl Trigger {
    async fn run(
        self,
        precision: Duration,
        mut shutdown: ShutdownListener,
        mut paused: watch::Receiver<bool>,
    ) {
        let mut ticker = time::interval_at(Instant::now() + precision, precision);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let is_paused = *paused.borrow_and_update();
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!(machine = %self.shared.name, "Trigger loop quit");
                    break;
                }
                changed = paused.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if !*paused.borrow() {
                        ticker.reset();
                    }
                }
                _ = ticker.tick(), if !is_paused => self.trigger(),
            }
        }
    }

    fn trigger(&self) {
        let Some(current) = self.shared.current.load_full() else {
            return;
        };
        let Some(state) = self.states.get(current.as_str()) else {
            return;
        };

        let Some(count) = state.tick() else {
            return;
        };

        if self.shared.trace.load(Ordering::Relaxed) && count % 5 == 0 {
            tracing::debug!(machine = %self.shared.name, state = %state.name(), "Triggering action");
        }

        state.run_action();

        if self.stopping.as_deref() == Some(state.name()) && !self.shared.stop_ack.send_replace(true) {
            tracing::debug!(machine = %self.shared.name, "Stop acknowledged");
        }
    }
}
