//! Optimistic concurrency retry

use crate::error::{Result, StoreError};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Maximum number of attempts
    pub steps: u32,
    /// Delay after the first conflict
    pub initial: Duration,
    /// Multiplier applied to the delay after each conflict
    pub factor: f64,
    /// Upper bound on a single delay
    pub cap: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            steps: 5,
            initial: Duration::from_millis(10),
            factor: 2.0,
            cap: Duration::from_secs(1),
        }
    }
}

impl Backoff {
    /// Delay to wait after `current`
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.mul_f64(self.factor).min(self.cap)
    }
}

/// Run `op` until it succeeds, fails with a non-conflict error, or attempts run out
pub async fn retry_on_conflict<T, F, Fut>(backoff: Backoff, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let steps = backoff.steps.max(1);
    let mut delay = backoff.initial;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_conflict() && attempt < steps => {
                debug!(attempt, delay = ?delay, error = %e, "Conflict, retrying");
                tokio::time::sleep(delay).await;
                delay = backoff.next_delay(delay);
            }
            Err(e) if e.is_conflict() => {
                return Err(StoreError::RetriesExhausted {
                    attempts: attempt,
                    source: Box::new(e),
                });
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_conflicts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry_on_conflict(Backoff::default(), || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(StoreError::Conflict("stale resourceVersion".into()))
                } else {
                    Ok("patched")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "patched");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_steps() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<()> = retry_on_conflict(Backoff::default(), || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Conflict("stale".into())) }
        })
        .await;

        assert!(matches!(
            result,
            Err(StoreError::RetriesExhausted { attempts: 5, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_other_errors_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<()> = retry_on_conflict(Backoff::default(), || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::kube("forbidden")) }
        })
        .await;

        assert!(matches!(result, Err(StoreError::Kube(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_is_capped() {
        let backoff = Backoff {
            cap: Duration::from_millis(30),
            ..Default::default()
        };
        assert_eq!(backoff.next_delay(Duration::from_millis(10)), Duration::from_millis(20));
        assert_eq!(backoff.next_delay(Duration::from_millis(20)), Duration::from_millis(30));
    }
}
