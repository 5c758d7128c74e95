//! Core types and events

use crate::config::TransferOptions;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// A parsed source locator
///
/// Locators of the form `scheme://...` are parsed with the `url` crate; anything
/// else is treated as a bare local filesystem path with no scheme.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceDescriptor {
    locator: String,
    scheme: Option<String>,
    url: Option<url::Url>,
}

impl SourceDescriptor {
    /// Parse a locator string
    pub fn parse(locator: &str) -> Result<Self> {
        let trimmed = locator.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidSource {
                source_locator: locator.to_string(),
                reason: "locator is empty".to_string(),
            });
        }

        if !has_scheme_prefix(trimmed) {
            return Ok(Self {
                locator: trimmed.to_string(),
                scheme: None,
                url: None,
            });
        }

        let url = url::Url::parse(trimmed).map_err(|e| Error::InvalidSource {
            source_locator: locator.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            locator: trimmed.to_string(),
            scheme: Some(url.scheme().to_ascii_lowercase()),
            url: Some(url),
        })
    }

    /// The original locator string
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Lower-cased scheme, or None for bare paths
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// Parsed URL, or None for bare paths
    pub fn url(&self) -> Option<&url::Url> {
        self.url.as_ref()
    }

    /// Whether the source is addressed over HTTP or HTTPS
    pub fn is_http(&self) -> bool {
        matches!(self.scheme(), Some("http") | Some("https"))
    }

    /// Path component of the locator (URL path, or the bare path itself)
    pub fn path(&self) -> &str {
        match &self.url {
            Some(url) => url.path(),
            None => &self.locator,
        }
    }

    /// Lower-cased extension of the last path segment, if any
    pub fn extension(&self) -> Option<String> {
        let path = self.path();
        let file_name = path.rsplit(['/', '\\']).next()?;
        let (stem, ext) = file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.locator)
    }
}

fn has_scheme_prefix(locator: &str) -> bool {
    match locator.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme.chars().all(|c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}

/// One contiguous byte range of a resource
///
/// `end` is inclusive, so `size == end - start + 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSpec {
    /// Ordinal within the plan
    pub index: usize,
    /// First byte offset
    pub start: u64,
    /// Last byte offset (inclusive)
    pub end: u64,
    /// Number of bytes in the range
    pub size: u64,
}

impl ChunkSpec {
    /// Value for an HTTP `Range` header
    pub fn range_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Outcome of one chunk fetch task
#[derive(Debug)]
pub enum ChunkOutcome {
    /// The chunk was fetched and written at its offset
    Success,
    /// The chunk failed permanently
    Failure(Error),
}

/// Result reported by one chunk fetch task
#[derive(Debug)]
pub struct ChunkResult {
    /// Chunk ordinal
    pub index: usize,
    /// Bytes written into the staging file
    pub bytes_written: u64,
    /// Final outcome after retries
    pub outcome: ChunkOutcome,
}

/// Metadata learned about a remote resource before transferring it
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    /// Total size in bytes, if the server reported one
    pub size: Option<u64>,
    /// Whether the server advertises byte-range support
    pub accepts_ranges: bool,
    /// Media type reported by the server
    pub content_type: Option<String>,
    /// Last-Modified header, parsed when well-formed
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
    /// Entity tag
    pub etag: Option<String>,
}

/// A requested source, optionally with an explicit destination filename
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Source locator
    pub source: String,
    /// Filename to use instead of a generated one
    #[serde(default)]
    pub filename: Option<String>,
}

impl TransferRequest {
    /// Request with an explicit destination filename
    pub fn named(source: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            filename: Some(filename.into()),
        }
    }
}

impl From<&str> for TransferRequest {
    fn from(source: &str) -> Self {
        Self {
            source: source.to_string(),
            filename: None,
        }
    }
}

impl From<String> for TransferRequest {
    fn from(source: String) -> Self {
        Self {
            source,
            filename: None,
        }
    }
}

impl From<&String> for TransferRequest {
    fn from(source: &String) -> Self {
        Self::from(source.as_str())
    }
}

/// One source-to-destination pairing with its resolved options
///
/// Lives for the duration of one source's transfer.
#[derive(Clone, Debug)]
pub struct TransferTask {
    /// Parsed source
    pub source: SourceDescriptor,
    /// Final destination path
    pub destination: PathBuf,
    /// Filename component of `destination`
    pub filename: String,
    /// Options in effect for this transfer
    pub options: TransferOptions,
}

impl TransferTask {
    /// Staging path used while the transfer is in progress
    pub fn staging_path(&self) -> PathBuf {
        crate::utils::staging_path(&self.destination)
    }
}

/// Outcome of one requested source
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    /// Whether the source was transferred, validated, and processed
    pub success: bool,
    /// The source locator as requested
    pub source: String,
    /// Final path of the file (after content handlers)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    /// Filename chosen for the transfer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Bytes transferred
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    /// Human-readable error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl TransferResult {
    /// Successful transfer
    pub fn succeeded(
        source: impl Into<String>,
        destination: PathBuf,
        filename: impl Into<String>,
        bytes: u64,
    ) -> Self {
        Self {
            success: true,
            source: source.into(),
            destination: Some(destination),
            filename: Some(filename.into()),
            bytes: Some(bytes),
            error: None,
            error_code: None,
        }
    }

    /// Failed transfer
    pub fn failed(source: impl Into<String>, error: &Error) -> Self {
        Self {
            success: false,
            source: source.into(),
            destination: None,
            filename: None,
            bytes: None,
            error: Some(error.to_string()),
            error_code: Some(error.error_code().to_string()),
        }
    }
}

/// Transfer lifecycle events broadcast to subscribers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A source started transferring
    TransferStarted {
        /// Source locator
        source: String,
        /// Destination path
        destination: PathBuf,
    },

    /// Bytes written so far for a chunked transfer
    Progress {
        /// Source locator
        source: String,
        /// Cumulative bytes written
        bytes_done: u64,
        /// Total size of the resource
        bytes_total: u64,
    },

    /// A chunked transfer was downgraded to a single whole-file request
    FallbackToWholeFile {
        /// Source locator
        source: String,
        /// Why ranges could not be used
        reason: String,
    },

    /// A source finished successfully
    TransferComplete {
        /// Source locator
        source: String,
        /// Final path
        destination: PathBuf,
        /// Bytes transferred
        bytes: u64,
    },

    /// A source failed
    TransferFailed {
        /// Source locator
        source: String,
        /// Error message
        error: String,
    },
}

/// Receiver of chunk progress
///
/// Called from whichever task completes a chunk, so implementations must be
/// thread-safe.
pub trait ProgressSink: Send + Sync {
    /// Cumulative bytes written out of the total
    fn on_progress(&self, bytes_done: u64, bytes_total: u64);
}

/// Progress sink that discards updates
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _bytes_done: u64, _bytes_total: u64) {}
}

/// Progress sink that forwards updates onto the event channel
pub(crate) struct EventProgress {
    pub(crate) source: String,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl ProgressSink for EventProgress {
    fn on_progress(&self, bytes_done: u64, bytes_total: u64) {
        self.event_tx
            .send(Event::Progress {
                source: self.source.clone(),
                bytes_done,
                bytes_total,
            })
            .ok();
    }
}

impl<F> ProgressSink for F
where
    F: Fn(u64, u64) + Send + Sync,
{
    fn on_progress(&self, bytes_done: u64, bytes_total: u64) {
        self(bytes_done, bytes_total)
    }
}

/// Shared handle to a progress sink
pub type SharedProgress = Arc<dyn ProgressSink>;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_http_locator_with_scheme() {
        let source = SourceDescriptor::parse("HTTPS://example.com/files/archive.ZIP").unwrap();

        assert_eq!(source.scheme(), Some("https"));
        assert!(source.is_http());
        assert_eq!(source.path(), "/files/archive.ZIP");
        assert_eq!(source.extension().as_deref(), Some("zip"));
    }

    #[test]
    fn bare_path_has_no_scheme() {
        let source = SourceDescriptor::parse("/var/data/report.pdf").unwrap();

        assert_eq!(source.scheme(), None);
        assert!(!source.is_http());
        assert_eq!(source.extension().as_deref(), Some("pdf"));
    }

    #[test]
    fn windows_drive_path_is_not_a_scheme() {
        let source = SourceDescriptor::parse(r"C:\data\file.txt").unwrap();
        assert_eq!(source.scheme(), None);
    }

    #[test]
    fn extension_absent_for_directory_like_paths() {
        let source = SourceDescriptor::parse("http://example.com/download").unwrap();
        assert_eq!(source.extension(), None);

        let source = SourceDescriptor::parse("http://example.com/").unwrap();
        assert_eq!(source.extension(), None);

        let hidden = SourceDescriptor::parse("/home/user/.bashrc").unwrap();
        assert_eq!(hidden.extension(), None, "dotfiles have no extension");
    }

    #[test]
    fn query_string_does_not_leak_into_extension() {
        let source = SourceDescriptor::parse("http://example.com/a.tar.gz?token=abc").unwrap();
        assert_eq!(source.extension().as_deref(), Some("gz"));
    }

    #[test]
    fn empty_and_malformed_locators_are_rejected() {
        assert!(matches!(
            SourceDescriptor::parse("   "),
            Err(Error::InvalidSource { .. })
        ));
        assert!(matches!(
            SourceDescriptor::parse("http://"),
            Err(Error::InvalidSource { .. })
        ));
    }

    #[test]
    fn chunk_range_header_is_inclusive() {
        let chunk = ChunkSpec {
            index: 0,
            start: 0,
            end: 1023,
            size: 1024,
        };
        assert_eq!(chunk.range_header(), "bytes=0-1023");
    }

    #[test]
    fn failed_result_carries_message_and_code() {
        let error = Error::NoTransportAvailable {
            source_locator: "gopher://old".into(),
        };
        let result = TransferResult::failed("gopher://old", &error);

        assert!(!result.success);
        assert_eq!(result.error_code.as_deref(), Some("no_transport_available"));
        assert!(result.error.unwrap().contains("gopher://old"));
        assert!(result.destination.is_none());
    }

    #[test]
    fn closures_act_as_progress_sinks() {
        let seen = std::sync::Mutex::new(Vec::new());
        let sink = |done: u64, total: u64| seen.lock().unwrap().push((done, total));

        sink.on_progress(10, 100);
        sink.on_progress(100, 100);

        assert_eq!(*seen.lock().unwrap(), vec![(10, 100), (100, 100)]);
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::Progress {
            source: "http://x/a".into(),
            bytes_done: 5,
            bytes_total: 10,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["bytes_done"], 5);
    }
}
