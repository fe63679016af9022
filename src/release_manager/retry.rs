//! Fixed-schedule retry for release-manager calls.
//!
//! A transport failure is retried after each delay in the schedule in turn
//! (1s, 2s, 5s, 10s by default, so ~18s in the worst case). Anything that isn't
//! a transport failure is returned immediately.
//!
//! Every wait races the delivery's cancellation token, so a shutdown doesn't
//! sit out the remaining backoff.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::error::ReleaseManagerError;

/// The waits between attempts. Its length is the number of retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySchedule {
    delays: Vec<Duration>,
}

impl RetrySchedule {
    /// Default schedule: 4 retries after 1s, 2s, 5s and 10s.
    pub const DEFAULT_DELAYS: [Duration; 4] = [
        Duration::from_secs(1),
        Duration::from_secs(2),
        Duration::from_secs(5),
        Duration::from_secs(10),
    ];

    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Builds a schedule from whole seconds, as it appears in configuration.
    pub fn from_secs(secs: &[u64]) -> Self {
        Self::new(secs.iter().copied().map(Duration::from_secs).collect())
    }

    /// A schedule that never retries.
    pub fn none() -> Self {
        Self::new(Vec::new())
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Number of retries (not including the initial attempt).
    pub fn max_retries(&self) -> usize {
        self.delays.len()
    }

    /// Total time spent waiting if every attempt fails.
    pub fn total_max_wait(&self) -> Duration {
        self.delays.iter().sum()
    }
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAYS.to_vec())
    }
}

/// Runs `operation`, retrying transport failures per `schedule`.
///
/// # Returns
///
/// - The first successful result.
/// - The first non-transient error, unchanged.
/// - The last transport error once the schedule is exhausted.
/// - [`ReleaseManagerError::Cancelled`] if `cancel` fires during a backoff wait.
pub async fn retry_with_backoff<T, F, Fut>(
    schedule: &RetrySchedule,
    cancel: &CancellationToken,
    endpoint: &str,
    mut operation: F,
) -> Result<T, ReleaseManagerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ReleaseManagerError>>,
{
    let mut delays = schedule.delays().iter();
    let mut attempt: u32 = 1;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !err.is_transient() {
            return Err(err);
        }

        let Some(delay) = delays.next() else {
            warn!(endpoint, attempts = attempt, error = %err, "Giving up on release manager");
            return Err(err);
        };

        warn!(
            endpoint,
            attempt,
            delay_secs = delay.as_secs(),
            error = %err,
            "Transport failure, retrying"
        );

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                return Err(ReleaseManagerError::Cancelled {
                    endpoint: endpoint.to_string(),
                });
            }
            _ = tokio::time::sleep(*delay) => {}
        }

        attempt += 1;
    }
}
