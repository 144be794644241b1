//! Retry with linear backoff for remote calls

use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Classifies an error as transient (worth retrying) or permanent.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Bounded retry schedule: up to `max_retries` extra attempts after the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Linear backoff: `base_delay * attempt` (1s, 2s, 3s, ... for a 1s base)
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Successful value plus the number of failed attempts that preceded it.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub value: T,
    pub retries: u32,
}

/// Why [`with_retry`] gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Non-retryable failure; returned without further attempts
    Permanent { error: E, retries: u32 },
    /// Transient failures used up every retry
    Exhausted { error: E, retries: u32 },
}

impl<E> RetryError<E> {
    pub fn retries(&self) -> u32 {
        match self {
            Self::Permanent { retries, .. } | Self::Exhausted { retries, .. } => *retries,
        }
    }

    pub fn error(&self) -> &E {
        match self {
            Self::Permanent { error, .. } | Self::Exhausted { error, .. } => error,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permanent { error, .. } => write!(f, "permanent failure: {error}"),
            Self::Exhausted { error, retries } => {
                write!(f, "gave up after {retries} retries: {error}")
            }
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.error())
    }
}

/// Run `attempt_fn` until it succeeds, fails permanently, or retries run out.
///
/// `attempt_fn` receives the zero-based attempt index. Before retry `n`
/// the task sleeps `policy.backoff_duration(n)`.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut attempt_fn: F,
) -> Result<Attempted<T>, RetryError<E>>
where
    E: Retryable + fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_retries = policy.max_retries;
    let mut attempt = 0u32;
    loop {
        match attempt_fn(attempt).await {
            Ok(value) => {
                return Ok(Attempted {
                    value,
                    retries: attempt,
                });
            }
            Err(e) if !e.is_retryable() => {
                log::warn!("{label}: failed permanently: {e}");
                return Err(RetryError::Permanent {
                    error: e,
                    retries: attempt,
                });
            }
            Err(e) if attempt < max_retries => {
                attempt += 1;
                log::debug!("{label}: attempt {attempt}/{max_retries} failed: {e}, retrying...");
                tokio::time::sleep(policy.backoff_duration(attempt)).await;
            }
            Err(e) => {
                log::warn!("{label}: retries exhausted ({max_retries}): {e}");
                return Err(RetryError::Exhausted {
                    error: e,
                    retries: attempt,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tokio::time::Instant;

    #[derive(Debug, PartialEq)]
    enum FakeError {
        Flaky,
        Broken,
    }

    impl fmt::Display for FakeError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::Flaky => write!(f, "flaky"),
                Self::Broken => write!(f, "broken"),
            }
        }
    }

    impl Retryable for FakeError {
        fn is_retryable(&self) -> bool {
            matches!(self, Self::Flaky)
        }
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_secs(1))
    }

    #[test]
    fn backoff_linear() {
        let p = policy(3);
        assert_eq!(p.backoff_duration(1), Duration::from_secs(1));
        assert_eq!(p.backoff_duration(2), Duration::from_secs(2));
        assert_eq!(p.backoff_duration(3), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn first_try_success_has_no_retries() {
        let out = with_retry(&policy(3), "t", |_| async { Ok::<_, FakeError>(7) })
            .await
            .unwrap();
        assert_eq!(out, Attempted { value: 7, retries: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_exactly_max_transient_failures() {
        let calls = Cell::new(0u32);
        let start = Instant::now();
        let out = with_retry(&policy(3), "t", |_| {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n <= 3 {
                    Err(FakeError::Flaky)
                } else {
                    Ok("done")
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(out.value, "done");
        assert_eq!(out.retries, 3);
        assert_eq!(calls.get(), 4);
        // 1s + 2s + 3s of backoff
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn always_transient_exhausts_with_max_retries() {
        let calls = Cell::new(0u32);
        let err = with_retry(&policy(3), "t", |_| {
            calls.set(calls.get() + 1);
            async { Err::<(), _>(FakeError::Flaky) }
        })
        .await
        .unwrap_err();

        assert!(err.is_exhausted());
        assert_eq!(err.retries(), 3);
        assert_eq!(calls.get(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_is_not_retried() {
        let calls = Cell::new(0u32);
        let err = with_retry(&policy(3), "t", |_| {
            calls.set(calls.get() + 1);
            async { Err::<(), _>(FakeError::Broken) }
        })
        .await
        .unwrap_err();

        assert!(!err.is_exhausted());
        assert_eq!(err.retries(), 0);
        assert_eq!(err.error(), &FakeError::Broken);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_after_transient_keeps_retry_count() {
        let err = with_retry(&policy(5), "t", |attempt| async move {
            if attempt < 2 {
                Err::<(), _>(FakeError::Flaky)
            } else {
                Err(FakeError::Broken)
            }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, RetryError::Permanent { retries: 2, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_gives_up_immediately() {
        let err = with_retry(&policy(0), "t", |_| async { Err::<(), _>(FakeError::Flaky) })
            .await
            .unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(err.retries(), 0);
    }

    #[test]
    fn display_mentions_retry_count() {
        let err = RetryError::Exhausted {
            error: FakeError::Flaky,
            retries: 3,
        };
        assert_eq!(format!("{err}"), "gave up after 3 retries: flaky");
    }
}
