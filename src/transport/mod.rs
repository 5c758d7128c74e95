//! Protocol transports and the router that picks one per source
//!
//! A [`Transport`] moves one resource from its source to a local path. Transports
//! that can serve byte ranges also expose a [`RangedTransport`], which the chunked
//! engine uses to split a resource into parallel range requests.
//!
//! [`ProtocolRouter`] holds the registered transports in order; the first one
//! whose [`supports`](Transport::supports) accepts a source handles it.

use crate::config::TransferOptions;
use crate::error::{Error, Result};
use crate::types::{ChunkSpec, ResourceInfo, SourceDescriptor};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

mod ftp;
mod http;
mod local;

pub use ftp::FtpTransport;
pub use http::HttpTransport;
pub use local::LocalTransport;

/// A protocol able to transfer a whole resource to a local path
///
/// # Examples
///
/// ```no_run
/// use file_dl::transport::{LocalTransport, Transport};
/// use file_dl::types::SourceDescriptor;
/// use file_dl::TransferOptions;
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = LocalTransport::new();
/// let source = SourceDescriptor::parse("/var/data/report.pdf")?;
/// assert!(transport.supports(&source));
///
/// let bytes = transport
///     .fetch(&source, Path::new("/tmp/report.pdf"), &TransferOptions::default())
///     .await?;
/// println!("copied {bytes} bytes");
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name used in logs and listings (e.g. "http")
    fn name(&self) -> &'static str;

    /// Whether this transport can handle the source
    fn supports(&self, source: &SourceDescriptor) -> bool;

    /// Apply options before the transport is registered
    ///
    /// Called once by [`DownloaderBuilder`](crate::DownloaderBuilder). Transports
    /// that hold long-lived clients rebuild them here.
    fn configure(&mut self, _options: &TransferOptions) -> Result<()> {
        Ok(())
    }

    /// Transfer the whole resource to `destination`, returning the bytes written
    ///
    /// Transient failures are retried per `options.retry`. Calling `fetch` again
    /// on the same destination after a failure overwrites it.
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        destination: &Path,
        options: &TransferOptions,
    ) -> Result<u64>;

    /// Byte-range capability, if the protocol has one
    fn ranged(self: Arc<Self>) -> Option<Arc<dyn RangedTransport>> {
        None
    }
}

/// Byte-range operations used by the chunked engine
///
/// Each method performs a single request; the caller decides about retries.
#[async_trait]
pub trait RangedTransport: Send + Sync {
    /// Fetch resource metadata without the body
    async fn probe(&self, source: &SourceDescriptor, options: &TransferOptions)
    -> Result<ResourceInfo>;

    /// Ask for the first byte only
    ///
    /// Returns the total size when the server answers with a usable partial
    /// response, or `None` when it ignores or refuses the range.
    async fn probe_range(
        &self,
        source: &SourceDescriptor,
        options: &TransferOptions,
    ) -> Result<Option<u64>>;

    /// Fetch exactly the bytes of one chunk
    async fn fetch_range(
        &self,
        source: &SourceDescriptor,
        chunk: &ChunkSpec,
        options: &TransferOptions,
    ) -> Result<Vec<u8>>;
}

/// Ordered registry of transports
#[derive(Clone, Default)]
pub struct ProtocolRouter {
    transports: Vec<Arc<dyn Transport>>,
}

impl ProtocolRouter {
    /// Create an empty router
    pub fn new() -> Self {
        Self::default()
    }

    /// Router with HTTP, FTP and local transports registered in that order
    pub fn with_default_transports(options: &TransferOptions) -> Result<Self> {
        let mut router = Self::new();
        router.register(HttpTransport::new(options)?);
        router.register(FtpTransport::new());
        router.register(LocalTransport::new());
        Ok(router)
    }

    /// Append a transport; earlier registrations win ties
    pub fn register<T: Transport + 'static>(&mut self, transport: T) {
        self.register_arc(Arc::new(transport));
    }

    /// Append an already shared transport
    pub fn register_arc(&mut self, transport: Arc<dyn Transport>) {
        tracing::debug!(transport = transport.name(), "registered transport");
        self.transports.push(transport);
    }

    /// First registered transport that supports the source
    pub fn route(&self, source: &SourceDescriptor) -> Result<Arc<dyn Transport>> {
        self.transports
            .iter()
            .find(|t| t.supports(source))
            .cloned()
            .ok_or_else(|| Error::NoTransportAvailable {
                source_locator: source.locator().to_string(),
            })
    }

    /// Registered transports in routing order
    pub fn transports(&self) -> &[Arc<dyn Transport>] {
        &self.transports
    }

    /// Names of the registered transports in routing order
    pub fn names(&self) -> Vec<&'static str> {
        self.transports.iter().map(|t| t.name()).collect()
    }
}

impl std::fmt::Debug for ProtocolRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolRouter")
            .field("transports", &self.names())
            .finish()
    }
}
