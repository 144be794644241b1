//! Run parameters for the pipeline engine

use std::fmt;
use std::time::Duration;

use screener_core::RetryPolicy;

/// Immutable parameters for one run. Call [`PipelineConfig::validate`] before use.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Items per scoring batch; batches run one after another
    pub batch_size: usize,
    pub max_concurrent_requests: usize,
    /// Minimum spacing between any two remote calls
    pub min_request_interval: Duration,
    /// Extra attempts after the first
    pub retry_count: u32,
    pub retry_base_delay: Duration,
    /// How many top scorers get a detailed analysis
    pub top_k: usize,
    pub call_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 250,
            max_concurrent_requests: 100,
            min_request_interval: Duration::from_millis(10),
            retry_count: 3,
            retry_base_delay: Duration::from_secs(1),
            top_k: 10,
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::new("batch_size", "must be at least 1"));
        }
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::new(
                "max_concurrent_requests",
                "must be at least 1",
            ));
        }
        if self.call_timeout.is_zero() {
            return Err(ConfigError::new("call_timeout", "must be greater than zero"));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_count, self.retry_base_delay)
    }
}

/// A config field holds a value the engine cannot run with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: String,
}

impl ConfigError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid config: {} {}", self.field, self.reason)
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = PipelineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.batch_size, 250);
        assert_eq!(cfg.top_k, 10);
    }

    #[test]
    fn zero_counts_rejected() {
        let cfg = PipelineConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate().unwrap_err().field, "batch_size");

        let cfg = PipelineConfig {
            max_concurrent_requests: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate().unwrap_err().field, "max_concurrent_requests");

        let cfg = PipelineConfig {
            call_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(cfg.validate().unwrap_err().field, "call_timeout");
    }

    #[test]
    fn zero_retries_and_zero_top_k_allowed() {
        let cfg = PipelineConfig {
            retry_count: 0,
            top_k: 0,
            min_request_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn retry_policy_mirrors_config() {
        let cfg = PipelineConfig {
            retry_count: 5,
            retry_base_delay: Duration::from_millis(200),
            ..Default::default()
        };
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.backoff_duration(2), Duration::from_millis(400));
    }
}
