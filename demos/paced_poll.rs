// demos/paced_poll.rs
//
// Polls a simulated endpoint that only tolerates a few requests per window and answers
// `429 Too Many Requests` beyond that. Run with `RUST_LOG=adaptive_pacing=debug` to watch the
// pacer back off and ease back in.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use adaptive_pacer::adaptive_pacing::{Pacer, PacingSettings, RunError};
use http::StatusCode;
use tokio::time::{Instant, sleep};
use tracing::info;

// --- Simulated endpoint ---
const WINDOW: Duration = Duration::from_secs(5);
const REQUESTS_PER_WINDOW: u64 = 3;
const DEMO_DURATION: Duration = Duration::from_secs(60);

struct Endpoint {
    opened: Instant,
    window: AtomicU64,
    hits: AtomicU64,
}

impl Endpoint {
    fn call(&self) -> StatusCode {
        let window = self.opened.elapsed().as_secs() / WINDOW.as_secs();
        if self.window.swap(window, Ordering::SeqCst) != window {
            self.hits.store(0, Ordering::SeqCst);
        }

        if self.hits.fetch_add(1, Ordering::SeqCst) < REQUESTS_PER_WINDOW {
            StatusCode::OK
        } else {
            StatusCode::TOO_MANY_REQUESTS
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .init();

    let endpoint = Arc::new(Endpoint {
        opened: Instant::now(),
        window: AtomicU64::new(0),
        hits: AtomicU64::new(0),
    });

    let settings: PacingSettings = serde_json::from_str(
        r#"{
            "minInterval": "100ms",
            "baseInterval": "250ms",
            "maxInterval": "10s",
            "fasterAfter": "8s",
            "delayOnFailure": "1s",
            "taskTimeLimit": "2s"
        }"#,
    )?;

    let task = {
        let endpoint = Arc::clone(&endpoint);
        move || {
            let endpoint = Arc::clone(&endpoint);
            async move {
                // Pretend the request takes a little while.
                sleep(Duration::from_millis(20)).await;
                let status = endpoint.call();
                info!(%status, "Endpoint answered");
                Ok::<_, std::io::Error>(status)
            }
        }
    };

    let pacer = Pacer::builder()
        .task(task)
        .settings(settings)
        .error_handler(|error: &RunError| tracing::error!(%error, "Run failed"))
        .build()?;

    pacer.start();

    let deadline = Instant::now() + DEMO_DURATION;
    while Instant::now() < deadline {
        sleep(Duration::from_secs(5)).await;
        let snapshot = pacer.snapshot();
        info!(
            runs = snapshot.runs,
            interval_ms = snapshot.current_interval.as_millis(),
            state = ?snapshot.state,
            "Pacer status"
        );
    }

    pacer.stop();
    Ok(())
}
