//! Primitives shared by both fan-out stages

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use screener_core::{BoundedExecutor, RateLimiter, RetryPolicy};

use crate::config::PipelineConfig;
use crate::oracle::OracleError;

/// One rate limiter, one executor and one retry policy, shared by every stage of a run.
#[derive(Debug, Clone)]
pub struct StageResources {
    pub limiter: Arc<RateLimiter>,
    pub executor: Arc<BoundedExecutor>,
    pub retry: RetryPolicy,
    pub call_timeout: Duration,
}

impl StageResources {
    pub fn new(config: &PipelineConfig, executor: BoundedExecutor) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::new(config.min_request_interval)),
            executor: Arc::new(executor),
            retry: config.retry_policy(),
            call_timeout: config.call_timeout,
        }
    }

    /// Wait for a rate-limiter slot, then run `call` under the per-call timeout.
    ///
    /// Every attempt goes through here, retries included.
    pub async fn guarded_call<T, F>(&self, call: F) -> Result<T, OracleError>
    where
        F: Future<Output = Result<T, OracleError>>,
    {
        self.limiter.acquire().await;
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(self.call_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screener_core::CancellationToken;

    fn resources(timeout: Duration) -> StageResources {
        let config = PipelineConfig {
            call_timeout: timeout,
            min_request_interval: Duration::from_millis(100),
            ..Default::default()
        };
        StageResources::new(&config, BoundedExecutor::new(4, CancellationToken::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_becomes_timeout() {
        let res = resources(Duration::from_secs(5));
        let err = res
            .guarded_call(std::future::pending::<Result<(), OracleError>>())
            .await
            .unwrap_err();
        assert_eq!(err, OracleError::Timeout(Duration::from_secs(5)));
        assert!(err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn calls_are_spaced_by_limiter() {
        let res = resources(Duration::from_secs(5));
        let start = tokio::time::Instant::now();
        for _ in 0..3 {
            res.guarded_call(async { Ok::<_, OracleError>(()) })
                .await
                .unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
