use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::ClientError;

/// Call `attempt` until it yields a value.
///
/// Each round calls `attempt` first, then gives up with
/// [`ClientError::Timeout`] once more than `timeout` has elapsed since the
/// first call, then sleeps `interval`. Errors from `attempt` end polling
/// immediately.
pub async fn poll_until<T, F, Fut>(
    interval: Duration,
    timeout: Duration,
    mut attempt: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, ClientError>>,
{
    let started = Instant::now();
    let mut rounds = 0u32;
    loop {
        rounds += 1;
        if let Some(value) = attempt().await? {
            tracing::debug!(rounds, "polling finished");
            return Ok(value);
        }
        if started.elapsed() > timeout {
            tracing::warn!(rounds, ?timeout, "polling timed out");
            return Err(ClientError::Timeout(timeout));
        }
        tokio::time::sleep(interval).await;
    }
}
