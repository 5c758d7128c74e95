//! Retry logic with exponential backoff
//!
//! [`RetryPolicy`] splits retrying into a pure decision
//! ([`should_retry`](RetryPolicy::should_retry)) and an async executor
//! ([`run`](RetryPolicy::run)) that sleeps the decided delay between attempts of
//! one logical request. Transports wrap each network request in `run`, and the
//! chunked engine wraps each range request, so retry granularity is per request.
//!
//! # Example
//!
//! ```no_run
//! use file_dl::config::RetryConfig;
//! use file_dl::retry::{IsRetryable, RetryPolicy};
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let policy = RetryPolicy::new(RetryConfig::default());
//! let value = policy.run(|| async { Ok::<_, MyError>(42) }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, TransportError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, server errors, connection reset) should return `true`.
/// Permanent failures (missing resources, content mismatches, size limits) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(e) => e.is_retryable(),
            Error::Io(e) => is_transient_io(e),
            // A failed chunk has already spent its own retry budget
            Error::ChunkFetch { .. } => false,
            Error::Config { .. }
            | Error::NoTransportAvailable { .. }
            | Error::InvalidSource { .. }
            | Error::RangeUnsupported { .. }
            | Error::Finalize { .. }
            | Error::SizeExceeded { .. }
            | Error::Validation { .. }
            | Error::ContentHandler { .. }
            | Error::Other(_) => false,
        }
    }
}

impl IsRetryable for TransportError {
    fn is_retryable(&self) -> bool {
        match self {
            TransportError::Status { status, .. } => *status >= 500,
            TransportError::Network(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_body()
                    || (e.is_request() && exchange_interrupted(e))
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            TransportError::Connection(_) | TransportError::Timeout(_) => true,
            // 4xx replies are transient in FTP, 5xx are permanent
            TransportError::Ftp { code, .. } => (400..500).contains(code),
            TransportError::Io(e) => is_transient_io(e),
            TransportError::NotFound(_) | TransportError::ContentMismatch { .. } => false,
        }
    }
}

fn is_transient_io(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::NotConnected
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::Interrupted
    )
}

/// Hyper's message when a connection closes before the response head arrives
const INCOMPLETE_MESSAGE: &str = "connection closed before message completed";

/// Whether a failed request was cut off at the connection level
fn exchange_interrupted(e: &reqwest::Error) -> bool {
    let mut cause = std::error::Error::source(e);
    while let Some(err) = cause {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            return is_transient_io(io) || io.kind() == std::io::ErrorKind::UnexpectedEof;
        }
        if err.to_string().contains(INCOMPLETE_MESSAGE) {
            return true;
        }
        cause = std::error::Error::source(err);
    }
    false
}

/// What to do after a failed attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryDecision {
    /// Whether another attempt should be made
    pub retry: bool,
    /// How long to wait before it (zero when not retrying)
    pub delay: Duration,
}

impl RetryDecision {
    const GIVE_UP: Self = Self {
        retry: false,
        delay: Duration::ZERO,
    };
}

/// Exponential backoff policy built from a [`RetryConfig`]
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a policy from its configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// The underlying configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Decide whether to retry after failed attempt number `attempt` (0-indexed)
    ///
    /// Retries only while `attempt < max_attempts` and the error is retryable.
    pub fn should_retry<E: IsRetryable>(&self, attempt: u32, outcome: &E) -> RetryDecision {
        if attempt >= self.config.max_attempts || !outcome.is_retryable() {
            return RetryDecision::GIVE_UP;
        }

        let base = self.delay_for(attempt);
        let delay = if self.config.jitter {
            add_jitter(base)
        } else {
            base
        };
        RetryDecision { retry: true, delay }
    }

    /// Backoff before retry `attempt`: `initial_delay * multiplier^attempt`, capped at `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.config.initial_delay.as_secs_f64()
            * self.config.backoff_multiplier.powi(exponent);
        let cap = self.config.max_delay;
        if !secs.is_finite() || secs >= cap.as_secs_f64() {
            return cap;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Execute an async operation, retrying transient failures
    ///
    /// Returns the first success, or the last error once the policy gives up.
    pub async fn run<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: IsRetryable + std::fmt::Display,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(attempts = attempt + 1, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    let decision = self.should_retry(attempt, &e);
                    if !decision.retry {
                        if e.is_retryable() {
                            tracing::error!(
                                error = %e,
                                attempts = attempt + 1,
                                "operation failed after all retry attempts exhausted"
                            );
                        } else {
                            tracing::error!(error = %e, "operation failed with non-retryable error");
                        }
                        return Err(e);
                    }

                    attempt += 1;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        max_attempts = self.config.max_attempts,
                        delay_ms = decision.delay.as_millis() as u64,
                        "operation failed, retrying"
                    );
                    tokio::time::sleep(decision.delay).await;
                }
            }
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.clone())
    }
}

/// Add random jitter so the delay lands in `[delay, 2 * delay]`
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + factor))
}
