//! Configuration types for file-dl
//!
//! [`TransferOptions`] is the explicit configuration bundle handed to every
//! operation. There is no process-wide default instance: callers build one
//! (usually via `TransferOptions::default()` plus struct update syntax) and pass
//! it by reference.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Options controlling a batch of transfers
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TransferOptions {
    /// Size of each byte-range chunk in bytes (default: 1 MiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Resources larger than this are rejected (default: 100 MiB, None = unlimited)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: Option<u64>,

    /// Split HTTP resources into parallel range requests (default: false)
    #[serde(default)]
    pub chunked_download: bool,

    /// Maximum chunk requests in flight for one chunked transfer (default: 3)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Maximum sources transferred at the same time within one batch (default: 1)
    #[serde(default = "default_max_concurrent_transfers")]
    pub max_concurrent_transfers: usize,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Connection establishment timeout (default: 10 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Extra request headers sent with every HTTP request
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// User-Agent header value (default: "file-dl/<version>")
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum number of HTTP redirects to follow (default: 5)
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Retry behavior for transient failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// FTP credentials and connection settings
    #[serde(default)]
    pub ftp: FtpConfig,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_file_size: default_max_file_size(),
            chunked_download: false,
            concurrency: default_concurrency(),
            max_concurrent_transfers: default_max_concurrent_transfers(),
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            headers: HashMap::new(),
            user_agent: default_user_agent(),
            max_redirects: default_max_redirects(),
            retry: RetryConfig::default(),
            ftp: FtpConfig::default(),
        }
    }
}

impl TransferOptions {
    /// Check the options for values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::config("chunk_size", "chunk_size must be greater than 0"));
        }
        if self.concurrency == 0 {
            return Err(Error::config("concurrency", "concurrency must be at least 1"));
        }
        if self.max_concurrent_transfers == 0 {
            return Err(Error::config(
                "max_concurrent_transfers",
                "max_concurrent_transfers must be at least 1",
            ));
        }
        if self.retry.backoff_multiplier < 1.0 || !self.retry.backoff_multiplier.is_finite() {
            return Err(Error::config(
                "retry.backoff_multiplier",
                "backoff_multiplier must be a finite number >= 1.0",
            ));
        }
        reqwest::header::HeaderValue::from_str(&self.user_agent)
            .map_err(|e| Error::config("user_agent", format!("invalid user agent: {e}")))?;
        for (name, value) in &self.headers {
            reqwest::header::HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                Error::config("headers", format!("invalid header name '{name}': {e}"))
            })?;
            reqwest::header::HeaderValue::from_str(value).map_err(|e| {
                Error::config("headers", format!("invalid value for header '{name}': {e}"))
            })?;
        }
        Ok(())
    }

    /// Check a known resource size against `max_file_size`
    pub fn check_size(&self, size: u64) -> Result<()> {
        match self.max_file_size {
            Some(limit) if size > limit => Err(Error::SizeExceeded { size, limit }),
            _ => Ok(()),
        }
    }
}

/// Retry configuration for transient failures
///
/// The delay before retry `n` (0-indexed) is
/// `initial_delay * backoff_multiplier^n`, capped at `max_delay`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// FTP connection settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FtpConfig {
    /// Control connection port when the URL does not carry one (default: 21)
    #[serde(default = "default_ftp_port")]
    pub port: u16,

    /// Username (None = anonymous)
    #[serde(default)]
    pub username: Option<String>,

    /// Password
    #[serde(default)]
    pub password: Option<String>,

    /// Control and data channel timeout (default: 90 seconds)
    #[serde(default = "default_ftp_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for FtpConfig {
    fn default() -> Self {
        Self {
            port: default_ftp_port(),
            username: None,
            password: None,
            timeout: default_ftp_timeout(),
        }
    }
}

fn default_chunk_size() -> u64 {
    1024 * 1024
}

fn default_max_file_size() -> Option<u64> {
    Some(100 * 1024 * 1024)
}

fn default_concurrency() -> usize {
    3
}

fn default_max_concurrent_transfers() -> usize {
    1
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_user_agent() -> String {
    format!("file-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_ftp_port() -> u16 {
    21
}

fn default_ftp_timeout() -> Duration {
    Duration::from_secs(90)
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
