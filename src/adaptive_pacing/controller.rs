//! The pacing loop.
//!
//! A [`Pacer`] owns a task and invokes it at most once at a time. When a run settles, its
//! outcome feeds the [`Regime`] and the next run is scheduled after
//! `max(0, interval - elapsed)`, plus `delay_on_failure` if the run failed.
//!
//! All state transitions go through `start`, `stop`, `pause`, `run` and `settle`. Timers only
//! ever call back into `start` (pause resume) or `run` (next run), and only while they are
//! still the timer registered in their slot.

use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use futures::{FutureExt, future};
use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{Instant, sleep, timeout},
};

use super::{
    PacingConfig, PacingSettings,
    error::{ArgumentError, ConfigError, InvalidOutcome, RunError},
    instant_now,
    internal_event::{
        PacerIntervalAdjusted, PacerRunCompleted, PacerRunScheduled, PacerStateChanged,
        PacerTaskTimedOut, emit,
    },
    outcome::Outcome,
    regime::{Adjustment, Regime},
    task::PacedTask,
};
use crate::Error as CrateError;

type Handler = Arc<dyn Fn(&RunError) + Send + Sync + 'static>;

/// Where the pacer is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
    /// Stopped, with a resume scheduled.
    Paused,
}

/// Point-in-time view of a pacer's runtime state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacerSnapshot {
    pub state: RunState,
    pub current_interval: Duration,
    pub has_pending_task: bool,
    /// Runs started since the pacer was built.
    pub runs: u64,
    pub last_run: Option<Instant>,
}

/// Builder for [`Pacer`]. Obtained from [`Pacer::builder`].
#[must_use]
pub struct PacerBuilder {
    task: Option<Arc<dyn PacedTask>>,
    settings: PacingSettings,
    error_handler: Option<Handler>,
    timeout_handler: Option<Handler>,
}

impl PacerBuilder {
    /// The work to pace. Required.
    pub fn task(mut self, task: impl PacedTask) -> Self {
        self.task = Some(Arc::new(task));
        self
    }

    pub fn settings(mut self, settings: PacingSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Called when a run fails, or reports an invalid outcome. Defaults to logging the error.
    pub fn error_handler(mut self, handler: impl Fn(&RunError) + Send + Sync + 'static) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Called when a run exceeds `task_time_limit`. Defaults to the error handler.
    pub fn timeout_handler(mut self, handler: impl Fn(&RunError) + Send + Sync + 'static) -> Self {
        self.timeout_handler = Some(Arc::new(handler));
        self
    }

    /// Resolves the settings and builds the pacer, starting it if `start_immediately` is set.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from [`PacingSettings::resolve`], [`ConfigError::MissingTask`]
    /// without a task, and [`ConfigError::NoRuntime`] outside a Tokio runtime.
    pub fn build(self) -> Result<Pacer, ConfigError> {
        let config = self.settings.resolve()?;
        let task = self.task.ok_or(ConfigError::MissingTask)?;
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;

        let error_handler = self
            .error_handler
            .unwrap_or_else(|| Arc::new(log_run_error) as Handler);
        let timeout_handler = self
            .timeout_handler
            .unwrap_or_else(|| Arc::clone(&error_handler));

        let inner = Arc::new(Inner {
            state: Mutex::new(RuntimeState::new(&config)),
            config,
            task,
            error_handler,
            timeout_handler,
            runtime,
        });

        debug!(
            message = "Pacer built.",
            base_interval_ms = config.base_interval.as_millis(),
            min_interval_ms = config.min_interval.as_millis(),
            max_interval_ms = config.max_interval.as_millis(),
            task_time_limit_ms = config.task_time_limit.map(|limit| limit.as_millis()),
        );

        if config.start_immediately {
            inner.start();
        }

        Ok(Pacer { inner })
    }
}

fn log_run_error(error: &RunError) {
    if error.is_timeout() {
        info!(message = "Task has timed out!", %error);
    } else {
        error!(message = "Task run failed.", %error);
    }
}

/// Runs a task over and over, adapting the delay between runs to the outcomes it reports.
///
/// Timers run on the Tokio runtime the pacer was built in; the control methods themselves are
/// synchronous and can be called from anywhere. Dropping the pacer stops it.
pub struct Pacer {
    inner: Arc<Inner>,
}

impl Pacer {
    pub fn builder() -> PacerBuilder {
        PacerBuilder {
            task: None,
            settings: PacingSettings::default(),
            error_handler: None,
            timeout_handler: None,
        }
    }

    /// Starts the loop, or restarts the schedule from now if it is already running.
    ///
    /// Cancels a pending resume or next run, restarts the quiet period and attempts a run
    /// right away.
    pub fn start(&self) {
        self.inner.start();
    }

    /// Cancels every pending timer. A run already in flight still completes and its outcome
    /// is still applied, but nothing further is scheduled.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Stops, then starts again after `millis` milliseconds.
    ///
    /// # Errors
    ///
    /// [`ArgumentError::InvalidPause`] if `millis` is negative, NaN or infinite. The current
    /// schedule is left untouched in that case. Pauses longer than [`Duration::MAX`] are
    /// capped to it.
    pub fn pause(&self, millis: f64) -> Result<(), ArgumentError> {
        let duration = Some(millis)
            .filter(|ms| ms.is_finite() && *ms >= 0.0)
            .map(|ms| Duration::try_from_secs_f64(ms / 1_000.0).unwrap_or(Duration::MAX))
            .ok_or(ArgumentError::InvalidPause { millis })?;
        self.pause_for(duration);
        Ok(())
    }

    /// Stops, then starts again after `duration`. A later pause replaces this one.
    pub fn pause_for(&self, duration: Duration) {
        self.inner.pause(duration);
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().is_running
    }

    pub fn state(&self) -> RunState {
        self.inner.lock().run_state()
    }

    pub fn current_interval(&self) -> Duration {
        self.inner.lock().regime.interval()
    }

    pub fn config(&self) -> &PacingConfig {
        &self.inner.config
    }

    pub fn snapshot(&self) -> PacerSnapshot {
        let state = self.inner.lock();
        PacerSnapshot {
            state: state.run_state(),
            current_interval: state.regime.interval(),
            has_pending_task: state.has_pending_task,
            runs: state.runs,
            last_run: state.last_run,
        }
    }
}

impl Drop for Pacer {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

impl fmt::Debug for Pacer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pacer")
            .field("config", &self.inner.config)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

struct Inner {
    config: PacingConfig,
    task: Arc<dyn PacedTask>,
    error_handler: Handler,
    timeout_handler: Handler,
    runtime: Handle,
    state: Mutex<RuntimeState>,
}

struct RuntimeState {
    regime: Regime,
    is_running: bool,
    has_pending_task: bool,
    last_run: Option<Instant>,
    runs: u64,
    timers: Timers,
}

impl RuntimeState {
    fn new(config: &PacingConfig) -> Self {
        Self {
            regime: Regime::new(config, instant_now()),
            is_running: false,
            has_pending_task: false,
            last_run: None,
            runs: 0,
            timers: Timers::default(),
        }
    }

    fn run_state(&self) -> RunState {
        if self.is_running {
            RunState::Running
        } else if self.timers.restart.is_some() {
            RunState::Paused
        } else {
            RunState::Stopped
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TimerSlot {
    Restart,
    NextRun,
}

struct Timer {
    id: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Timers {
    last_id: u64,
    restart: Option<Timer>,
    next_run: Option<Timer>,
}

impl Timers {
    fn slot(&mut self, slot: TimerSlot) -> &mut Option<Timer> {
        match slot {
            TimerSlot::Restart => &mut self.restart,
            TimerSlot::NextRun => &mut self.next_run,
        }
    }

    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    fn clear(&mut self, slot: TimerSlot) {
        if let Some(timer) = self.slot(slot).take() {
            timer.handle.abort();
        }
    }

    fn clear_all(&mut self) {
        self.clear(TimerSlot::Restart);
        self.clear(TimerSlot::NextRun);
    }

    /// Unregisters the timer `id` if it is still the one armed in `slot`.
    fn claim(&mut self, slot: TimerSlot, id: u64) -> bool {
        let entry = self.slot(slot);
        if entry.as_ref().is_some_and(|timer| timer.id == id) {
            *entry = None;
            true
        } else {
            false
        }
    }
}

/// How a run ended.
enum Settled {
    Reported(Outcome),
    Invalid(InvalidOutcome),
    Failed(CrateError),
    TimedOut(Duration),
}

impl Settled {
    fn label(&self) -> &'static str {
        match self {
            Settled::Reported(outcome) => outcome.as_str(),
            Settled::Invalid(_) => "invalid",
            Settled::Failed(_) => "error",
            Settled::TimedOut(_) => "timeout",
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "task panicked".to_owned())
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, RuntimeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start(self: &Arc<Self>) {
        {
            let mut state = self.lock();
            state.timers.clear_all();
            state.is_running = true;
            state.regime.restart_quiet_period(instant_now());
        }
        emit(PacerStateChanged {
            state: RunState::Running,
        });
        self.run();
    }

    fn stop(&self) {
        {
            let mut state = self.lock();
            state.timers.clear_all();
            state.is_running = false;
        }
        emit(PacerStateChanged {
            state: RunState::Stopped,
        });
    }

    fn pause(self: &Arc<Self>, duration: Duration) {
        {
            let mut state = self.lock();
            state.timers.clear_all();
            state.is_running = false;
            self.arm(&mut state, TimerSlot::Restart, duration);
        }
        debug!(message = "Pacer paused.", resume_in_ms = duration.as_millis());
        emit(PacerStateChanged {
            state: RunState::Paused,
        });
    }

    /// Arms `slot` to fire after `delay`, replacing whatever was armed there.
    fn arm(self: &Arc<Self>, state: &mut RuntimeState, slot: TimerSlot, delay: Duration) {
        state.timers.clear(slot);
        let id = state.timers.next_id();
        let pacer = Arc::downgrade(self);
        let handle = self.runtime.spawn(async move {
            sleep(delay).await;
            if let Some(inner) = Weak::upgrade(&pacer) {
                inner.fire(slot, id);
            }
        });
        *state.timers.slot(slot) = Some(Timer { id, handle });
    }

    fn fire(self: &Arc<Self>, slot: TimerSlot, id: u64) {
        if !self.lock().timers.claim(slot, id) {
            return;
        }
        match slot {
            TimerSlot::Restart => self.start(),
            TimerSlot::NextRun => self.run(),
        }
    }

    /// Attempts one run. No-op when stopped or while another run is in flight.
    fn run(self: &Arc<Self>) {
        let started = instant_now();
        {
            let mut state = self.lock();
            if !state.is_running || state.has_pending_task {
                return;
            }
            state.has_pending_task = true;
            state.last_run = Some(started);
            state.runs += 1;
        }

        // Callers may start the pacer from outside the runtime.
        let _runtime = self.runtime.enter();
        let task = match panic::catch_unwind(AssertUnwindSafe(|| self.task.invoke())) {
            Ok(invoked) => AssertUnwindSafe(invoked)
                .catch_unwind()
                .map(|caught| match caught {
                    Ok(Ok(Ok(outcome))) => Settled::Reported(outcome),
                    Ok(Ok(Err(invalid))) => Settled::Invalid(invalid),
                    Ok(Err(error)) => Settled::Failed(error),
                    Err(payload) => Settled::Failed(panic_message(payload).into()),
                })
                .boxed(),
            Err(payload) => future::ready(Settled::Failed(panic_message(payload).into())).boxed(),
        };
        let time_limit = self.config.task_time_limit;
        let inner = Arc::clone(self);

        self.runtime.spawn(async move {
            // A task that loses the race is dropped along with its result.
            let settled = match time_limit {
                Some(limit) => timeout(limit, task)
                    .await
                    .unwrap_or(Settled::TimedOut(limit)),
                None => task.await,
            };
            inner.settle(settled, started);
        });
    }

    fn settle(self: &Arc<Self>, settled: Settled, started: Instant) {
        emit(PacerRunCompleted {
            outcome: settled.label(),
            duration: started.elapsed(),
        });

        let run_error = {
            let mut state = self.lock();
            let previous = state.regime.interval();
            match settled {
                Settled::Reported(outcome) => {
                    let adjustment = state.regime.apply(outcome, &self.config, instant_now());
                    if adjustment != Adjustment::Held {
                        emit(PacerIntervalAdjusted {
                            adjustment,
                            previous,
                            current: state.regime.interval(),
                        });
                    }
                    None
                }
                Settled::Invalid(source) => Some(RunError::InvalidOutcome { source }),
                Settled::Failed(source) => {
                    state.regime.record_failure();
                    Some(RunError::Task { source })
                }
                Settled::TimedOut(limit) => {
                    state.regime.record_failure();
                    emit(PacerTaskTimedOut { limit });
                    Some(RunError::Timeout { limit })
                }
            }
        };

        // Handlers run without the lock so they may call back into the pacer.
        if let Some(error) = run_error {
            let handler = if error.is_timeout() {
                &self.timeout_handler
            } else {
                &self.error_handler
            };
            handler(&error);
        }

        let mut state = self.lock();
        let penalized = state.regime.has_failure();
        let delay = state
            .regime
            .next_delay(&self.config, started.elapsed());
        if state.is_running {
            self.arm(&mut state, TimerSlot::NextRun, delay);
            emit(PacerRunScheduled { delay, penalized });
        }
        state.has_pending_task = false;
    }
}
