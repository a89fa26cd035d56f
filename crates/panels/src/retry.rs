//! Bounded retry for adapter operations.
//!
//! Adapters never loop-and-sleep inline; they run retryable steps through a
//! [`RetryPolicy`] so attempt budgets and delays are explicit and tests can
//! use a zero-delay policy.

use std::future::Future;
use std::time::Duration;

use rand::random;
use tokio::time::sleep;
use tracing::debug;

use crate::error::PanelError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    /// Add up to delay/4 of random jitter between attempts.
    pub jitter: bool,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            jitter: false,
        }
    }

    pub const fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// Immediate, single-attempt policy.
    pub const fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    fn backoff(&self) -> Duration {
        if !self.jitter || self.delay.is_zero() {
            return self.delay;
        }
        let quarter = (self.delay.as_millis() as u64) / 4;
        let jitter_ms = if quarter == 0 { 0 } else { random::<u64>() % (quarter + 1) };
        self.delay + Duration::from_millis(jitter_ms)
    }

    /// Run `op` until it succeeds, fails fatally, or the budget runs out.
    ///
    /// Only transient errors are retried; `InvalidCredentials` (and other
    /// non-transient errors) abort immediately. The final transient error is
    /// returned unmodified after the last attempt.
    pub async fn run<T, F, Fut>(&self, op_name: &'static str, mut op: F) -> Result<T, PanelError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, PanelError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    debug!(
                        op = op_name,
                        attempt,
                        max = attempts,
                        error = %err,
                        "Retryable failure"
                    );
                    last_err = Some(err);
                    sleep(self.backoff()).await;
                }
                Err(err) => return Err(err),
            }
        }
        // Unreachable unless max_attempts == 0 was clamped; keep a real error anyway.
        Err(last_err.unwrap_or_else(|| PanelError::Unavailable(format!("{op_name}: no attempts"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn stops_after_budget_and_returns_last_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let result: Result<(), _> = policy
            .run("always-fails", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(PanelError::TransientAuth("captcha rejected".into())) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(PanelError::TransientAuth(_))));
    }

    #[tokio::test]
    async fn fatal_error_short_circuits() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::ZERO);
        let result: Result<(), _> = policy
            .run("bad-creds", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(PanelError::InvalidCredentials("rejected".into())) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(PanelError::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn succeeds_mid_budget() {
        let policy = RetryPolicy::new(4, Duration::ZERO);
        let result = policy
            .run("flaky", |attempt| async move {
                if attempt < 3 {
                    Err(PanelError::Unavailable("down".into()))
                } else {
                    Ok(attempt)
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 3);
    }
}
