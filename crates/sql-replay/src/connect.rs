//! Connection opening with a bounded number of attempts.

use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::error::Result;

/// Run `op` until it succeeds or `attempts` tries have failed, sleeping a
/// fixed `delay` between tries. The last error is returned.
///
/// `what` names the endpoint in log messages (e.g. "corpus store localhost:3306").
pub async fn with_retry<T, F, Fut>(what: &str, attempts: u32, delay: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let attempts = attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => {
                debug!("Connected to {} after {} attempt(s)", what, attempt);
                return Ok(value);
            }
            Err(e) if attempt < attempts => {
                warn!(
                    "Connecting to {} failed, retry {}/{}: {}",
                    what, attempt, attempts, e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(
                    "Connecting to {} failed after {} attempts in {:?}: {}",
                    what,
                    attempts,
                    started.elapsed(),
                    e
                );
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReplayError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry("test", 5, Duration::from_millis(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ReplayError::pool("refused", "test"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry("test", 3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ReplayError::pool("refused", "test")) }
        })
        .await;

        assert!(matches!(result, Err(ReplayError::Pool { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
