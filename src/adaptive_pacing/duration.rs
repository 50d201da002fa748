//! Duration inputs accepted by the settings layer.
//!
//! A duration is either a non-negative number of milliseconds or a string made of a number
//! followed by one of the suffixes `h`, `m`, `s` or `ms` (`"1h"`, `"1.5s"`, `"250ms"`).

use std::{fmt, time::Duration};

use serde::Deserialize;

use super::error::ConfigError;

const MILLIS_PER_SECOND: f64 = 1_000.0;

/// Unit suffixes and their length in milliseconds. `ms` must be tried before `m` and `s`.
const UNITS: [(&str, f64); 4] = [
    ("ms", 1.0),
    ("h", 3_600_000.0),
    ("m", 60_000.0),
    ("s", 1_000.0),
];

/// A raw, not yet validated duration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DurationInput {
    /// Milliseconds.
    Millis(f64),
    /// `<number><h|m|s|ms>`.
    Text(String),
    /// An already typed duration, only reachable from code.
    #[serde(skip_deserializing)]
    Exact(Duration),
}

impl DurationInput {
    /// Validates the input and converts it to a [`Duration`].
    ///
    /// `field` names the setting in the returned error.
    pub fn parse(&self, field: &'static str) -> Result<Duration, ConfigError> {
        let millis = match self {
            DurationInput::Exact(duration) => return Ok(*duration),
            DurationInput::Millis(millis) => Some(*millis),
            DurationInput::Text(text) => parse_text(text),
        };

        millis
            .filter(|ms| ms.is_finite() && *ms >= 0.0)
            .and_then(millis_to_duration)
            .ok_or_else(|| ConfigError::InvalidDuration {
                field,
                input: self.to_string(),
            })
    }

    pub(crate) fn is_none_keyword(&self) -> bool {
        matches!(self, DurationInput::Text(text) if text == "none")
    }
}

fn millis_to_duration(millis: f64) -> Option<Duration> {
    // Whole milliseconds stay exact; fractions go through seconds.
    if millis.fract() == 0.0 && millis < u64::MAX as f64 {
        return Some(Duration::from_millis(millis as u64));
    }
    Duration::try_from_secs_f64(millis / MILLIS_PER_SECOND).ok()
}

fn parse_text(text: &str) -> Option<f64> {
    let (number, unit_millis) = UNITS
        .iter()
        .find_map(|(suffix, unit)| text.strip_suffix(suffix).map(|number| (number, *unit)))?;

    let well_formed = !number.is_empty()
        && number.chars().all(|c| c.is_ascii_digit() || c == '.')
        && number.chars().filter(|c| *c == '.').count() <= 1;
    if !well_formed {
        return None;
    }

    number.parse::<f64>().ok().map(|value| value * unit_millis)
}

impl fmt::Display for DurationInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationInput::Millis(millis) => write!(f, "{millis}"),
            DurationInput::Text(text) => write!(f, "{text:?}"),
            DurationInput::Exact(duration) => write!(f, "{duration:?}"),
        }
    }
}

impl From<&str> for DurationInput {
    fn from(text: &str) -> Self {
        DurationInput::Text(text.to_owned())
    }
}

impl From<String> for DurationInput {
    fn from(text: String) -> Self {
        DurationInput::Text(text)
    }
}

impl From<Duration> for DurationInput {
    fn from(duration: Duration) -> Self {
        DurationInput::Exact(duration)
    }
}

impl From<f64> for DurationInput {
    fn from(millis: f64) -> Self {
        DurationInput::Millis(millis)
    }
}

macro_rules! impl_from_millis {
    ($($int:ty),*) => {
        $(
            impl From<$int> for DurationInput {
                fn from(millis: $int) -> Self {
                    DurationInput::Millis(millis as f64)
                }
            }
        )*
    };
}

impl_from_millis!(u32, u64, i32, i64);
