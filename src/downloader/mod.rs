//! Top-level downloader: one result per requested source
//!
//! The [`Downloader`] is split into focused submodules:
//! - `transfer` - the per-source pipeline (route, name, fetch, finalize, post-process)

mod transfer;


use crate::builder::DownloaderBuilder;
use crate::config::TransferOptions;
use crate::error::{Error, Result};
use crate::post_transfer::PostTransfer;
use crate::retry::RetryPolicy;
use crate::transport::{ProtocolRouter, Transport};
use crate::types::{Event, ResourceInfo, SourceDescriptor, TransferRequest, TransferResult};
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the event channel; slow subscribers lag rather than block transfers
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Downloader instance (cloneable - all fields are cheap to share)
///
/// Holds the transport registry and post-transfer pipeline. Transfer options are
/// passed to every call, so one instance can serve batches with different
/// settings.
///
/// # Examples
///
/// ```no_run
/// use file_dl::{Downloader, TransferOptions};
///
/// # #[tokio::main]
/// # async fn main() -> file_dl::Result<()> {
/// let options = TransferOptions {
///     chunked_download: true,
///     ..TransferOptions::default()
/// };
/// let downloader = Downloader::new(&options)?;
///
/// let results = downloader
///     .download(
///         ["https://example.com/big.iso", "ftp://mirror.example.com/pub/notes.txt"],
///         "./downloads",
///         &options,
///     )
///     .await;
///
/// for result in results {
///     match result.destination {
///         Some(path) => println!("{} -> {}", result.source, path.display()),
///         None => eprintln!("{} failed: {:?}", result.source, result.error),
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Downloader {
    /// Registered transports in routing order
    pub(crate) router: ProtocolRouter,
    /// Validators and content handlers run after each successful transfer
    pub(crate) post: Arc<PostTransfer>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
}

impl Downloader {
    /// Downloader with the HTTP, FTP and local transports and no post-processing
    pub fn new(options: &TransferOptions) -> Result<Self> {
        Ok(Self::from_parts(
            ProtocolRouter::with_default_transports(options)?,
            PostTransfer::new(),
        ))
    }

    /// Start building a downloader with custom transports, validators and handlers
    pub fn builder() -> DownloaderBuilder {
        DownloaderBuilder::new()
    }

    pub(crate) fn from_parts(router: ProtocolRouter, post: PostTransfer) -> Self {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            router,
            post: Arc::new(post),
            event_tx,
        }
    }

    /// Subscribe to transfer events
    ///
    /// Each subscriber receives every event sent after it subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Registered transports in routing order
    pub fn transports(&self) -> &[Arc<dyn Transport>] {
        self.router.transports()
    }

    /// Validators and content handlers applied after each transfer
    pub fn post_transfer(&self) -> &PostTransfer {
        &self.post
    }

    /// Transfer every requested source into `destination_dir`
    ///
    /// Returns exactly one result per request, in request order. A failing
    /// source never affects the others: its error is recorded in its own
    /// result and the batch continues. At most
    /// `options.max_concurrent_transfers` sources are in flight at once.
    pub async fn download<I>(
        &self,
        requests: I,
        destination_dir: impl AsRef<Path>,
        options: &TransferOptions,
    ) -> Vec<TransferResult>
    where
        I: IntoIterator,
        I::Item: Into<TransferRequest>,
    {
        let requests: Vec<TransferRequest> = requests.into_iter().map(Into::into).collect();
        let destination_dir = destination_dir.as_ref();

        if let Err(e) = self.prepare(destination_dir, options).await {
            tracing::error!(error = %e, sources = requests.len(), "batch rejected");
            return requests
                .iter()
                .map(|request| {
                    self.emit_failed(&request.source, &e);
                    TransferResult::failed(request.source.clone(), &e)
                })
                .collect();
        }

        futures::stream::iter(requests)
            .map(|request| self.transfer(request, destination_dir, options))
            .buffered(options.max_concurrent_transfers)
            .collect()
            .await
    }

    /// Transfer a single source; see [`download`](Self::download)
    pub async fn download_one(
        &self,
        request: impl Into<TransferRequest>,
        destination_dir: impl AsRef<Path>,
        options: &TransferOptions,
    ) -> TransferResult {
        let request = request.into();
        let source = request.source.clone();
        self.download([request], destination_dir, options)
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| {
                TransferResult::failed(source, &Error::Other("no result produced".into()))
            })
    }

    /// Metadata for an HTTP resource without downloading it
    pub async fn file_info(&self, source: &str, options: &TransferOptions) -> Result<ResourceInfo> {
        let source = SourceDescriptor::parse(source)?;
        if !source.is_http() {
            return Err(Error::InvalidSource {
                source_locator: source.locator().to_string(),
                reason: "file info is only available for HTTP sources".to_string(),
            });
        }

        let transport = self.router.route(&source)?;
        let Some(ranged) = transport.ranged() else {
            return Err(Error::InvalidSource {
                source_locator: source.locator().to_string(),
                reason: "transport cannot report resource metadata".to_string(),
            });
        };

        let policy = RetryPolicy::from(&options.retry);
        policy.run(|| ranged.probe(&source, options)).await
    }

    async fn prepare(&self, destination_dir: &Path, options: &TransferOptions) -> Result<()> {
        options.validate()?;
        tokio::fs::create_dir_all(destination_dir).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create destination directory '{}': {}",
                    destination_dir.display(),
                    e
                ),
            ))
        })
    }

    pub(crate) fn emit(&self, event: Event) {
        // no subscribers is fine
        self.event_tx.send(event).ok();
    }

    fn emit_failed(&self, source: &str, error: &Error) {
        self.emit(Event::TransferFailed {
            source: source.to_string(),
            error: error.to_string(),
        });
    }
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("router", &self.router)
            .field("post", &self.post)
            .field("subscribers", &self.event_tx.receiver_count())
            .finish()
    }
}
