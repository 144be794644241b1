//! Screener Core - Concurrency primitives for rate-limited remote pipelines
//!
//! This crate provides the building blocks shared by every pipeline stage:
//! a minimum-interval rate limiter, a concurrency-bounded executor with
//! keyed fan-in, a retry combinator with linear backoff, and progress
//! reporting that works both on a TTY and in log-only environments.

pub mod executor;
pub mod logging;
pub mod progress;
pub mod rate_limit;
pub mod retry;
pub mod shutdown;

// Re-exports for convenience
pub use executor::{BoundedExecutor, Execution};
pub use logging::{IndicatifLogger, LogLevel, init_logging, log_section};
pub use progress::{ProgressContext, ProgressTracker, SharedProgress, fmt_num};
pub use rate_limit::RateLimiter;
pub use retry::{Attempted, RetryError, RetryPolicy, Retryable, with_retry};
pub use shutdown::{CancellationToken, cancel_on_ctrl_c};
