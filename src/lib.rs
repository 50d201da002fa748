//! Adaptive task pacing driven by rate-limit feedback.
//!
//! This crate repeatedly invokes a unit of work (a "task") and adapts the delay between
//! invocations to what the task reports back after each run: `ok`, `rateLimited` or `failure`.
//!
//! # Algorithm Overview
//!
//! 1. **Back off on congestion**: a rate-limited run doubles the interval, up to `maxInterval`
//! 2. **Speed up after a quiet period**: once no rate limit has been seen for `fasterAfter`,
//!    every successful run moves the interval halfway back toward `baseInterval`
//! 3. **Penalize failures once**: a failed run adds `delayOnFailure` to the next schedule only
//!
//! # Features
//! - Single-flight execution: never more than one task invocation in progress
//! - Optional per-run time limit with a dedicated timeout handler
//! - Run/stop/pause state machine with cancellable timers
//! - Settings parseable from JSON (`"250ms"`, `"2s"`, `"5m"`, `"1h"` or plain milliseconds)
//!
//! # Basic Usage
//! ```no_run
//! use adaptive_pacer::adaptive_pacing::{Outcome, Pacer, PacingSettings};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = PacingSettings::builder()
//!     .base_interval("500ms")
//!     .max_interval("30s")
//!     .build();
//!
//! let pacer = Pacer::builder()
//!     .task(|| async { Ok::<_, std::io::Error>(Outcome::Ok) })
//!     .settings(settings)
//!     .build()?;
//!
//! pacer.start();
//! # Ok(())
//! # }
//! ```
//!
//! # Metrics
//! Emits metrics via the `InternalEvent` trait
pub mod adaptive_pacing;
#[cfg(test)]
pub mod test_utils;

#[macro_use]
extern crate tracing;

pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;
