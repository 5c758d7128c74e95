//! Error types for file-dl
//!
//! This module provides error handling for the library, including:
//! - The top-level [`Error`] returned by every fallible operation
//! - [`TransportError`] for failures inside a single protocol exchange
//! - Stable machine-readable error codes for [`TransferResult`](crate::types::TransferResult)

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for file-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for file-dl
///
/// Every variant is caught at the single-source boundary inside
/// [`Downloader::download`](crate::Downloader::download) and converted into a failed
/// [`TransferResult`](crate::types::TransferResult), so one source's error never
/// aborts a batch.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The option that caused the error (e.g., "chunk_size")
        key: Option<String>,
    },

    /// No registered transport accepts the source
    #[error("no transport available for source: {source_locator}")]
    NoTransportAvailable {
        /// The locator nobody claimed
        source_locator: String,
    },

    /// The source locator could not be parsed
    #[error("invalid source '{source_locator}': {reason}")]
    InvalidSource {
        /// The offending locator
        source_locator: String,
        /// Why parsing failed
        reason: String,
    },

    /// Connection, protocol, or I/O failure inside a transport
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server cannot serve byte ranges for this resource
    ///
    /// Never surfaced to callers: the chunked engine answers it by falling back
    /// to a whole-file transfer.
    #[error("byte ranges not supported by {source_locator}")]
    RangeUnsupported {
        /// The resource that refused ranges
        source_locator: String,
    },

    /// One chunk exhausted its retries, aborting the whole chunked transfer
    #[error("chunk {index} (bytes {start}-{end}) failed: {cause}")]
    ChunkFetch {
        /// Chunk ordinal
        index: usize,
        /// First byte of the chunk
        start: u64,
        /// Last byte of the chunk (inclusive)
        end: u64,
        /// The last error returned for this chunk
        cause: Box<Error>,
    },

    /// Renaming the staging file onto the destination failed
    #[error("failed to finalize {staging} -> {destination}: {reason}")]
    Finalize {
        /// The staging (`.part`) file
        staging: PathBuf,
        /// The intended destination
        destination: PathBuf,
        /// Underlying reason
        reason: String,
    },

    /// The resource is larger than the configured `max_file_size`
    #[error("resource size {size} bytes exceeds limit of {limit} bytes")]
    SizeExceeded {
        /// Size learned from the server or observed on disk
        size: u64,
        /// Configured cap
        limit: u64,
    },

    /// A post-transfer validator rejected the file
    #[error("validation failed ({validator}): {reason}")]
    Validation {
        /// Name of the rejecting validator
        validator: String,
        /// Reason reported by the validator
        reason: String,
    },

    /// A content handler failed while processing the file
    #[error("content handler {handler} failed: {reason}")]
    ContentHandler {
        /// Name of the failing handler
        handler: String,
        /// Reason reported by the handler
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors raised inside one protocol exchange
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server answered with an unexpected HTTP status
    #[error("HTTP {status} for {url}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// reqwest-level failure (connect, timeout, body decode, redirect loop)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Connection could not be established or was dropped
    #[error("connection failed: {0}")]
    Connection(String),

    /// Operation timed out
    #[error("timed out: {0}")]
    Timeout(String),

    /// FTP server returned an error reply
    #[error("FTP {code}: {message}")]
    Ftp {
        /// Three-digit reply code
        code: u16,
        /// Reply text
        message: String,
    },

    /// The source does not exist
    #[error("source not found: {0}")]
    NotFound(PathBuf),

    /// The server answered successfully but with the wrong content
    #[error("content mismatch: expected {expected}, got {actual}")]
    ContentMismatch {
        /// What the request expected
        expected: String,
        /// What the server sent
        actual: String,
    },

    /// I/O error on the transport's socket or local file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error for a named option
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Get the machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::NoTransportAvailable { .. } => "no_transport_available",
            Error::InvalidSource { .. } => "invalid_source",
            Error::Transport(e) => match e {
                TransportError::Status { .. } => "http_status",
                TransportError::Network(_) => "network_error",
                TransportError::Connection(_) => "connection_failed",
                TransportError::Timeout(_) => "timeout",
                TransportError::Ftp { .. } => "ftp_error",
                TransportError::NotFound(_) => "source_not_found",
                TransportError::ContentMismatch { .. } => "content_mismatch",
                TransportError::Io(_) => "transport_io_error",
            },
            Error::RangeUnsupported { .. } => "range_unsupported",
            Error::ChunkFetch { .. } => "chunk_fetch_failed",
            Error::Finalize { .. } => "finalize_failed",
            Error::SizeExceeded { .. } => "size_exceeded",
            Error::Validation { .. } => "validation_failed",
            Error::ContentHandler { .. } => "content_handler_failed",
            Error::Io(_) => "io_error",
            Error::Other(_) => "internal_error",
        }
    }
}
