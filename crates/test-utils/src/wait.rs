//! Async polling helpers for tests that observe a background worker.

use std::time::Duration;
use tokio::time::{sleep, Instant};

use query_engine::{QueryOutcome, QueryScheduler};

/// Poll interval used by the helpers below.
pub const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Default upper bound for waits in tests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll `condition` until it holds or `timeout` elapses. Returns whether it held.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Collect outcomes oldest-first until one is terminal or `timeout` elapses.
pub async fn drain_until_terminal(scheduler: &QueryScheduler, timeout: Duration) -> Vec<QueryOutcome> {
    let deadline = Instant::now() + timeout;
    let mut seen = Vec::new();
    while Instant::now() < deadline {
        if let Some(outcome) = scheduler.pop_result(false) {
            let terminal = outcome.is_terminal();
            seen.push(outcome);
            if terminal {
                break;
            }
        } else {
            sleep(POLL_INTERVAL).await;
        }
    }
    seen
}
