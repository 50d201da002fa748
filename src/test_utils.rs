use std::sync::{Arc, Mutex};

use tokio::time::Instant;

use crate::adaptive_pacing::RunError;

/// Slack allowed when comparing run start times against the paused test clock.
const TOLERANCE_MS: u64 = 5;

pub fn trace_init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Records when each task invocation started.
#[derive(Clone, Default)]
pub struct RunLog {
    starts: Arc<Mutex<Vec<Instant>>>,
}

impl RunLog {
    /// Records an invocation and returns its zero-based index.
    pub fn record(&self) -> usize {
        let mut starts = self.starts.lock().unwrap();
        starts.push(Instant::now());
        starts.len() - 1
    }

    pub fn len(&self) -> usize {
        self.starts.lock().unwrap().len()
    }

    pub fn first(&self) -> Instant {
        self.starts.lock().unwrap()[0]
    }

    pub fn offsets_ms(&self, origin: Instant) -> Vec<u64> {
        self.starts
            .lock()
            .unwrap()
            .iter()
            .map(|start| start.saturating_duration_since(origin).as_millis() as u64)
            .collect()
    }
}

/// Collects every error handed to a handler.
#[derive(Clone, Default)]
pub struct HandlerLog {
    seen: Arc<Mutex<Vec<(bool, String)>>>,
}

impl HandlerLog {
    pub fn handler(&self) -> impl Fn(&RunError) + Send + Sync + 'static {
        let seen = Arc::clone(&self.seen);
        move |error: &RunError| {
            seen.lock()
                .unwrap()
                .push((error.is_timeout(), error.to_string()));
        }
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn messages(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn all_timeouts(&self) -> bool {
        self.seen.lock().unwrap().iter().all(|(timeout, _)| *timeout)
    }
}

#[track_caller]
pub fn assert_offsets(actual: &[u64], expected: &[u64]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "expected runs at {expected:?}ms, got {actual:?}ms"
    );
    for (actual_ms, expected_ms) in actual.iter().zip(expected) {
        assert!(
            actual_ms.abs_diff(*expected_ms) <= TOLERANCE_MS,
            "expected runs at {expected:?}ms, got {actual:?}ms"
        );
    }
}
