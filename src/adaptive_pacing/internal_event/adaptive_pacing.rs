use std::time::Duration;

use metrics::{counter, histogram};

use super::InternalEvent;
use crate::adaptive_pacing::{RunState, regime::Adjustment};

#[derive(Clone, Copy, Debug)]
pub struct PacerStateChanged {
    pub state: RunState,
}

impl InternalEvent for PacerStateChanged {
    fn emit(self) {
        tracing::debug!(target: "adaptive_pacing::stats", state = ?self.state, "Pacer State Changed");
    }
}

/// A run settled. `outcome` is one of `ok`, `rate_limited`, `failure`, `timeout`, `error`
/// or `invalid`.
#[derive(Clone, Copy, Debug)]
pub struct PacerRunCompleted {
    pub outcome: &'static str,
    pub duration: Duration,
}

impl InternalEvent for PacerRunCompleted {
    fn emit(self) {
        counter!("adaptive_pacer_runs_total", "outcome" => self.outcome).increment(1);
        histogram!("adaptive_pacer_run_duration_seconds").record(self.duration);
        tracing::trace!(
            target: "adaptive_pacing::stats",
            outcome = self.outcome,
            run_ms = self.duration.as_millis(),
            "Run Completed"
        );
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PacerIntervalAdjusted {
    pub adjustment: Adjustment,
    pub previous: Duration,
    pub current: Duration,
}

impl InternalEvent for PacerIntervalAdjusted {
    fn emit(self) {
        histogram!("adaptive_pacer_interval_ms").record(self.current.as_millis() as f64);
        match self.adjustment {
            Adjustment::BackedOff => tracing::info!(
                target: "adaptive_pacing::stats",
                previous_interval_ms = self.previous.as_millis(),
                interval_ms = self.current.as_millis(),
                "Rate limited, backing off"
            ),
            Adjustment::Eased => tracing::debug!(
                target: "adaptive_pacing::stats",
                previous_interval_ms = self.previous.as_millis(),
                interval_ms = self.current.as_millis(),
                "Interval eased"
            ),
            Adjustment::Held | Adjustment::Penalized => {}
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PacerTaskTimedOut {
    pub limit: Duration,
}

impl InternalEvent for PacerTaskTimedOut {
    fn emit(self) {
        counter!("adaptive_pacer_timeouts_total").increment(1);
        tracing::warn!(
            target: "adaptive_pacing::stats",
            limit_ms = self.limit.as_millis(),
            "Task exceeded its time limit"
        );
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PacerRunScheduled {
    pub delay: Duration,
    pub penalized: bool,
}

impl InternalEvent for PacerRunScheduled {
    fn emit(self) {
        tracing::debug!(
            target: "adaptive_pacing::stats",
            delay_ms = self.delay.as_millis(),
            penalized = self.penalized,
            "Next Run Scheduled"
        );
    }
}
