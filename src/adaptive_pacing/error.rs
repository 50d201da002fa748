use std::time::Duration;

use snafu::Snafu;

use crate::Error as CrateError;

/// Errors raised while turning [`PacingSettings`](super::PacingSettings) and the builder inputs
/// into a running [`Pacer`](super::Pacer). These are fatal to instance creation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("Parameter \"task\" must be provided"))]
    MissingTask,

    #[snafu(display("Invalid time format for `{field}`: {input}"))]
    InvalidDuration { field: &'static str, input: String },

    #[snafu(display(
        "Interval bounds must satisfy min <= base <= max (min {}ms, base {}ms, max {}ms)",
        min.as_millis(),
        base.as_millis(),
        max.as_millis()
    ))]
    InvalidBounds {
        min: Duration,
        base: Duration,
        max: Duration,
    },

    #[snafu(display("A pacer must be built from within a Tokio runtime"))]
    NoRuntime,
}

/// Invalid argument passed to a [`Pacer`](super::Pacer) operation. The existing schedule is
/// left untouched.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ArgumentError {
    #[snafu(display("Argument must be a non-negative number (milliseconds to pause), got {millis}"))]
    InvalidPause { millis: f64 },
}

/// A status reported by a task that does not name one of the three outcomes.
#[derive(Debug, Snafu)]
#[snafu(display("Invalid status code: {value}"))]
pub struct InvalidOutcome {
    pub(crate) value: String,
}

impl InvalidOutcome {
    pub(crate) fn new(value: impl ToString) -> Self {
        Self {
            value: value.to_string(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Abnormal end of a single run, handed to the error or timeout handler.
///
/// None of these stop the schedule: the run is accounted for and the loop moves on.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RunError {
    /// The run exceeded `taskTimeLimit`. Delivered to the timeout handler.
    #[snafu(display("Task has timed out after {}ms", limit.as_millis()))]
    Timeout { limit: Duration },

    /// The task itself returned an error.
    #[snafu(display("Task failed: {source}"))]
    Task { source: CrateError },

    /// The task reported something that is not an outcome. The interval is left unchanged.
    #[snafu(context(false), display("{source}"))]
    InvalidOutcome { source: InvalidOutcome },
}

impl RunError {
    pub const fn is_timeout(&self) -> bool {
        matches!(self, RunError::Timeout { .. })
    }
}
