//! # file-dl
//!
//! Multi-protocol file downloader with a chunked parallel HTTP engine.
//!
//! ## Design Philosophy
//!
//! file-dl is designed to be:
//! - **Protocol-pluggable** - HTTP(S), FTP and local paths out of the box; add your own [`Transport`]
//! - **Fast on large files** - HTTP resources can be split into byte ranges fetched in parallel
//! - **Safe on failure** - transfers stage through `<destination>.part`; a destination is never half-written
//! - **Library-first** - no CLI, no global state; every call takes explicit [`TransferOptions`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use file_dl::{Downloader, TransferOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = TransferOptions {
//!         chunked_download: true,
//!         chunk_size: 4 * 1024 * 1024,
//!         concurrency: 4,
//!         ..Default::default()
//!     };
//!
//!     let downloader = Downloader::new(&options)?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let results = downloader
//!         .download(["https://example.com/dataset.tar.gz"], "./downloads", &options)
//!         .await;
//!     for result in results {
//!         println!("{} -> success: {}", result.source, result.success);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Fluent construction of a downloader
pub mod builder;
/// Configuration types
pub mod config;
/// Chunked parallel transfer of a single HTTP resource
pub mod coordinator;
/// Top-level downloader producing one result per source
pub mod downloader;
/// Error types
pub mod error;
/// Byte-range chunk planning
pub mod planner;
/// Bounded-concurrency task execution
pub mod pool;
/// Validators and content handlers run after a transfer
pub mod post_transfer;
/// Retry logic with exponential backoff
pub mod retry;
/// Protocol transports and routing
pub mod transport;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use builder::DownloaderBuilder;
pub use config::{FtpConfig, RetryConfig, TransferOptions};
pub use coordinator::ChunkedFetchCoordinator;
pub use downloader::Downloader;
pub use error::{Error, Result, TransportError};
pub use post_transfer::{ContentHandler, Validator};
pub use transport::{ProtocolRouter, RangedTransport, Transport};
pub use types::{
    ChunkSpec, Event, ProgressSink, ResourceInfo, SourceDescriptor, TransferRequest,
    TransferResult,
};
