//! Interval adaptation.
//!
//! A [`Regime`] turns the stream of run outcomes into the delay before the next run:
//!
//! - **ok**: once `faster_after` has passed since the last rate limit, the interval moves
//!   halfway back toward `base_interval`. Before that it is left alone, so the pacer does not
//!   oscillate right after being throttled.
//! - **rate limited**: the interval doubles (at least up to `base_interval`) and the quiet
//!   period restarts.
//! - **failure**: the interval is untouched; `delay_on_failure` is added to the next schedule
//!   only.
//!
//! The interval always stays within `[min_interval, max_interval]`.

use std::time::Duration;

use tokio::time::Instant;

use super::{PacingConfig, outcome::Outcome};

/// Growth factor applied on a rate limit.
const BACKOFF_FACTOR: u32 = 2;

/// Smallest interval a back-off can produce, so a zero interval still grows.
const MIN_BACKOFF: Duration = Duration::from_millis(1);

/// Once the interval is this close to `base_interval`, easing lands on it exactly.
const EASE_SNAP: Duration = Duration::from_millis(1);

/// What a single outcome did to the regime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Adjustment {
    /// Interval unchanged.
    Held,
    /// Interval moved toward `base_interval`.
    Eased,
    /// Interval grew after a rate limit.
    BackedOff,
    /// Next schedule will carry the failure penalty.
    Penalized,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Regime {
    interval: Duration,
    last_rate_limit: Instant,
    has_failure: bool,
}

impl Regime {
    pub fn new(config: &PacingConfig, now: Instant) -> Self {
        Self {
            interval: config.clamp(config.base_interval),
            last_rate_limit: now,
            has_failure: false,
        }
    }

    /// The live delay between runs, before any failure penalty.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_rate_limit(&self) -> Instant {
        self.last_rate_limit
    }

    pub fn has_failure(&self) -> bool {
        self.has_failure
    }

    /// Restarts the quiet-period clock, as if a rate limit had just been seen.
    pub fn restart_quiet_period(&mut self, now: Instant) {
        self.last_rate_limit = now;
    }

    /// Feeds one outcome into the regime.
    pub fn apply(&mut self, outcome: Outcome, config: &PacingConfig, now: Instant) -> Adjustment {
        match outcome {
            Outcome::Ok => self.ease(config, now),
            Outcome::RateLimited => self.back_off(config, now),
            Outcome::Failure => self.record_failure(),
        }
    }

    /// Marks the current run as failed; the next schedule carries `delay_on_failure`.
    pub fn record_failure(&mut self) -> Adjustment {
        self.has_failure = true;
        Adjustment::Penalized
    }

    /// Computes the delay before the next run and consumes the pending failure penalty.
    ///
    /// `elapsed` is the time spent since the current run started.
    pub fn next_delay(&mut self, config: &PacingConfig, elapsed: Duration) -> Duration {
        let delay = self.interval.saturating_sub(elapsed);
        if std::mem::take(&mut self.has_failure) {
            delay.saturating_add(config.delay_on_failure)
        } else {
            delay
        }
    }

    fn ease(&mut self, config: &PacingConfig, now: Instant) -> Adjustment {
        if now.saturating_duration_since(self.last_rate_limit) < config.faster_after {
            return Adjustment::Held;
        }

        let base = config.base_interval;
        let gap = self.interval.abs_diff(base);
        let eased = if gap <= EASE_SNAP {
            base
        } else if self.interval > base {
            self.interval - gap / 2
        } else {
            self.interval + gap / 2
        };
        let eased = config.clamp(eased);

        if eased == self.interval {
            Adjustment::Held
        } else {
            self.interval = eased;
            Adjustment::Eased
        }
    }

    fn back_off(&mut self, config: &PacingConfig, now: Instant) -> Adjustment {
        self.last_rate_limit = now;

        let grown = self
            .interval
            .saturating_mul(BACKOFF_FACTOR)
            .max(config.base_interval)
            .max(MIN_BACKOFF);
        let grown = config.clamp(grown);

        if grown == self.interval {
            Adjustment::Held
        } else {
            self.interval = grown;
            Adjustment::BackedOff
        }
    }
}
