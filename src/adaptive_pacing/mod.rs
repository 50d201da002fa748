//! Pace a repeating task by adapting the delay between runs.

mod controller;
pub mod duration;
pub mod error;
pub mod internal_event;
pub mod outcome;
pub mod regime;
pub mod task;

use std::time::Duration;

use bon::Builder;
use serde::Deserialize;

pub use controller::{Pacer, PacerBuilder, PacerSnapshot, RunState};
pub use duration::DurationInput;
pub use error::{ArgumentError, ConfigError, InvalidOutcome, RunError};
pub use outcome::{IntoOutcome, Outcome};
pub use task::PacedTask;

fn instant_now() -> tokio::time::Instant {
    tokio::time::Instant::now()
}

/// Raw pacing parameters, as supplied by the caller.
///
/// Every duration may be given as milliseconds or as a string such as `"250ms"`, `"2s"`,
/// `"5m"` or `"1h"`. Nothing is validated until [`PacingSettings::resolve`] runs, which
/// happens when a [`Pacer`] is built.
///
/// | Parameter | Default | Description |
/// |-----------|---------|-------------|
/// | `task_time_limit` | none | Maximum duration of a single run before it counts as timed out |
/// | `min_interval` | 0 | Floor for the delay between runs |
/// | `base_interval` | 1s | Starting delay, and the value the pacer eases back to |
/// | `max_interval` | 60s | Ceiling for the delay between runs |
/// | `faster_after` | 60s | Quiet period without rate limits before the interval eases down |
/// | `delay_on_failure` | 0 | Extra delay added to the schedule right after a failed run |
/// | `start_immediately` | false | Start the loop as soon as the pacer is built |
///
/// # Example
///
/// ```rust
/// use adaptive_pacer::adaptive_pacing::PacingSettings;
///
/// let settings = PacingSettings::builder()
///     .base_interval("2s")
///     .max_interval(120_000u64)
///     .delay_on_failure("500ms")
///     .build();
///
/// let config = settings.resolve().unwrap();
/// assert_eq!(config.max_interval().as_secs(), 120);
/// ```
///
/// Settings can also be read from JSON:
///
/// ```rust
/// use adaptive_pacer::adaptive_pacing::PacingSettings;
///
/// let settings: PacingSettings =
///     serde_json::from_str(r#"{ "baseInterval": "2s", "taskTimeLimit": 500 }"#).unwrap();
/// assert!(settings.resolve().is_ok());
/// ```
#[derive(Clone, Debug, Default, Deserialize, Builder)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct PacingSettings {
    /// Maximum time a single run may take. `"none"`, zero or absent disables the limit.
    #[builder(into)]
    pub task_time_limit: Option<DurationInput>,

    #[builder(into)]
    pub min_interval: Option<DurationInput>,

    #[builder(into)]
    pub base_interval: Option<DurationInput>,

    #[builder(into)]
    pub max_interval: Option<DurationInput>,

    /// How long the pacer must go without a rate limit before it starts speeding back up.
    #[builder(into)]
    pub faster_after: Option<DurationInput>,

    /// One-shot penalty added to the schedule that follows a failed run.
    #[builder(into)]
    pub delay_on_failure: Option<DurationInput>,

    #[builder(default)]
    pub start_immediately: bool,
}

const fn default_min_interval() -> Duration {
    Duration::ZERO
}

const fn default_base_interval() -> Duration {
    Duration::from_secs(1)
}

const fn default_max_interval() -> Duration {
    Duration::from_secs(60)
}

const fn default_faster_after() -> Duration {
    Duration::from_secs(60)
}

const fn default_delay_on_failure() -> Duration {
    Duration::ZERO
}

fn resolve_or(
    input: Option<&DurationInput>,
    field: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    input.map_or(Ok(default), |input| input.parse(field))
}

impl PacingSettings {
    /// Validates every field and fills in defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidDuration`] for a malformed or negative duration, and
    /// [`ConfigError::InvalidBounds`] unless `min_interval <= base_interval <= max_interval`.
    pub fn resolve(&self) -> Result<PacingConfig, ConfigError> {
        let task_time_limit = match &self.task_time_limit {
            None => None,
            Some(input) if input.is_none_keyword() => None,
            Some(input) => Some(input.parse("taskTimeLimit")?).filter(|limit| !limit.is_zero()),
        };

        let config = PacingConfig {
            task_time_limit,
            min_interval: resolve_or(
                self.min_interval.as_ref(),
                "minInterval",
                default_min_interval(),
            )?,
            base_interval: resolve_or(
                self.base_interval.as_ref(),
                "baseInterval",
                default_base_interval(),
            )?,
            max_interval: resolve_or(
                self.max_interval.as_ref(),
                "maxInterval",
                default_max_interval(),
            )?,
            faster_after: resolve_or(
                self.faster_after.as_ref(),
                "fasterAfter",
                default_faster_after(),
            )?,
            delay_on_failure: resolve_or(
                self.delay_on_failure.as_ref(),
                "delayOnFailure",
                default_delay_on_failure(),
            )?,
            start_immediately: self.start_immediately,
        };

        if config.min_interval > config.base_interval || config.base_interval > config.max_interval
        {
            return Err(ConfigError::InvalidBounds {
                min: config.min_interval,
                base: config.base_interval,
                max: config.max_interval,
            });
        }

        Ok(config)
    }
}

/// Fully resolved, immutable pacing parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacingConfig {
    pub(super) task_time_limit: Option<Duration>,
    pub(super) min_interval: Duration,
    pub(super) base_interval: Duration,
    pub(super) max_interval: Duration,
    pub(super) faster_after: Duration,
    pub(super) delay_on_failure: Duration,
    pub(super) start_immediately: bool,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            task_time_limit: None,
            min_interval: default_min_interval(),
            base_interval: default_base_interval(),
            max_interval: default_max_interval(),
            faster_after: default_faster_after(),
            delay_on_failure: default_delay_on_failure(),
            start_immediately: false,
        }
    }
}

impl PacingConfig {
    pub fn task_time_limit(&self) -> Option<Duration> {
        self.task_time_limit
    }
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
    pub fn base_interval(&self) -> Duration {
        self.base_interval
    }
    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }
    pub fn faster_after(&self) -> Duration {
        self.faster_after
    }
    pub fn delay_on_failure(&self) -> Duration {
        self.delay_on_failure
    }
    pub fn start_immediately(&self) -> bool {
        self.start_immediately
    }

    /// Clamps `interval` into `[min_interval, max_interval]`.
    pub(crate) fn clamp(&self, interval: Duration) -> Duration {
        interval.clamp(self.min_interval, self.max_interval)
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    #[test]
    fn defaults() {
        let config = assert_ok!(PacingSettings::default().resolve());
        assert_eq!(config, PacingConfig::default());
        assert_eq!(config.task_time_limit(), None);
        assert_eq!(config.min_interval(), Duration::ZERO);
        assert_eq!(config.base_interval(), Duration::from_secs(1));
        assert_eq!(config.max_interval(), Duration::from_secs(60));
        assert_eq!(config.faster_after(), Duration::from_secs(60));
        assert_eq!(config.delay_on_failure(), Duration::ZERO);
        assert!(!config.start_immediately());
    }

    #[test]
    fn builder_accepts_mixed_duration_forms() {
        let settings = PacingSettings::builder()
            .task_time_limit("500ms")
            .min_interval(100u64)
            .base_interval("2s")
            .max_interval(Duration::from_secs(300))
            .faster_after("5m")
            .delay_on_failure(1_500.0)
            .start_immediately(true)
            .build();

        let config = assert_ok!(settings.resolve());
        assert_eq!(config.task_time_limit(), Some(Duration::from_millis(500)));
        assert_eq!(config.min_interval(), Duration::from_millis(100));
        assert_eq!(config.base_interval(), Duration::from_secs(2));
        assert_eq!(config.max_interval(), Duration::from_secs(300));
        assert_eq!(config.faster_after(), Duration::from_secs(300));
        assert_eq!(config.delay_on_failure(), Duration::from_millis(1_500));
        assert!(config.start_immediately());
    }

    #[test]
    fn none_disables_the_time_limit() {
        let settings = PacingSettings::builder().task_time_limit("none").build();
        assert_eq!(assert_ok!(settings.resolve()).task_time_limit(), None);
    }

    #[test]
    fn zero_disables_the_time_limit() {
        let settings = PacingSettings::builder().task_time_limit(0u64).build();
        assert_eq!(assert_ok!(settings.resolve()).task_time_limit(), None);

        let settings: PacingSettings =
            serde_json::from_str(r#"{ "taskTimeLimit": 0 }"#).unwrap();
        assert_eq!(assert_ok!(settings.resolve()).task_time_limit(), None);

        let settings = PacingSettings::builder().task_time_limit("0ms").build();
        assert_eq!(assert_ok!(settings.resolve()).task_time_limit(), None);
    }

    #[test]
    fn invalid_durations_name_their_field() {
        let settings = PacingSettings::builder().faster_after("soon").build();
        match assert_err!(settings.resolve()) {
            ConfigError::InvalidDuration { field, input } => {
                assert_eq!(field, "fasterAfter");
                assert_eq!(input, "\"soon\"");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let settings = PacingSettings::builder().delay_on_failure(-10i64).build();
        assert!(matches!(
            settings.resolve(),
            Err(ConfigError::InvalidDuration {
                field: "delayOnFailure",
                ..
            })
        ));
    }

    #[test]
    fn bounds_must_be_ordered() {
        let settings = PacingSettings::builder()
            .min_interval("2s")
            .base_interval("1s")
            .build();
        assert!(matches!(
            settings.resolve(),
            Err(ConfigError::InvalidBounds { .. })
        ));

        let settings = PacingSettings::builder()
            .base_interval("2m")
            .max_interval("1m")
            .build();
        assert!(matches!(
            settings.resolve(),
            Err(ConfigError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn deserializes_from_json() {
        let settings: PacingSettings = serde_json::from_str(
            r#"{
                "taskTimeLimit": "none",
                "minInterval": 250,
                "baseInterval": "1.5s",
                "maxInterval": "1h",
                "fasterAfter": "30s",
                "delayOnFailure": "750ms",
                "startImmediately": true
            }"#,
        )
        .unwrap();

        let config = assert_ok!(settings.resolve());
        assert_eq!(config.task_time_limit(), None);
        assert_eq!(config.min_interval(), Duration::from_millis(250));
        assert_eq!(config.base_interval(), Duration::from_millis(1_500));
        assert_eq!(config.max_interval(), Duration::from_secs(3_600));
        assert_eq!(config.faster_after(), Duration::from_secs(30));
        assert_eq!(config.delay_on_failure(), Duration::from_millis(750));
        assert!(config.start_immediately());
    }

    #[test]
    fn unknown_json_fields_are_rejected() {
        let parsed = serde_json::from_str::<PacingSettings>(r#"{ "window": 1000 }"#);
        assert!(parsed.is_err());
    }
}
