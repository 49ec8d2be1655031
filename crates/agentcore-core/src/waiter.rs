//! Polling until a resource reaches a terminal status.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::domain::{DeployError, Result};
use crate::obs;

/// Poll interval and overall bound for one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl WaitPolicy {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Managed build jobs: 10 s interval, one hour bound.
    pub fn build() -> Self {
        Self::new(Self::DEFAULT_INTERVAL, Duration::from_secs(3600))
    }

    /// Runtime readiness: 10 s interval, ten minute bound.
    pub fn runtime_ready() -> Self {
        Self::new(Self::DEFAULT_INTERVAL, Duration::from_secs(600))
    }
}

/// Poll `poll` until it yields a status in `terminal`.
///
/// The terminal status is returned as-is; callers decide whether it means
/// success. Fails with `TimedOut` once `policy.timeout` has elapsed without
/// a terminal status. Errors from `poll` abort the wait. The remote job is
/// not cancelled on timeout.
pub async fn wait_for_terminal<S, F, Fut>(
    resource: &str,
    policy: WaitPolicy,
    terminal: &[S],
    mut poll: F,
) -> Result<S>
where
    S: PartialEq + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<S>>,
{
    let start = Instant::now();
    loop {
        let status = poll().await?;
        let elapsed = start.elapsed();
        obs::emit_wait_polled(resource, &status.to_string(), elapsed.as_secs());

        if terminal.contains(&status) {
            return Ok(status);
        }
        if elapsed >= policy.timeout {
            return Err(DeployError::TimedOut {
                resource: resource.to_string(),
                waited_secs: elapsed.as_secs(),
            });
        }
        tokio::time::sleep(policy.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_returns_first_terminal_status() {
        let polls = AtomicUsize::new(0);
        let seq = ["A", "B", "DONE", "LATER"];
        let polls_ref = &polls;
        let status = wait_for_terminal(
            "thing",
            WaitPolicy::new(Duration::from_secs(1), Duration::from_secs(60)),
            &["DONE"],
            || async move { Ok(seq[polls_ref.fetch_add(1, Ordering::SeqCst)]) },
        )
        .await
        .expect("wait failed");
        assert_eq!(status, "DONE");
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_error_aborts() {
        let err = wait_for_terminal::<&str, _, _>(
            "thing",
            WaitPolicy::build(),
            &["DONE"],
            || async { Err(DeployError::Config("boom".to_string())) },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DeployError::Config(_)));
    }
}
