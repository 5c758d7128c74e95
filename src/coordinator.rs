//! Chunked fetch coordination for one ranged resource
//!
//! A transfer moves through these phases, each logged at debug level:
//!
//! ```text
//! Init -> Probe -> (ProbeOk | ProbeFailed) -> [RangeProbe] -> Plan -> Fetching
//!      -> (Finalize | Abort) -> Done
//! ```
//!
//! The resource is staged in `<destination>.part`, pre-sized to the full length.
//! Chunk tasks write their bytes at their own offsets with positional writes,
//! so no lock guards the file. The staging file is renamed onto the
//! destination only after every chunk succeeded; on any permanent chunk failure
//! it is deleted and the destination is left untouched.
//!
//! When the size cannot be learned, [`ChunkedFetchCoordinator::fetch`] returns
//! [`Error::RangeUnsupported`] and the caller falls back to a whole-file transfer.

use crate::config::TransferOptions;
use crate::error::{Error, Result};
use crate::planner;
use crate::pool::ConcurrencyPool;
use crate::retry::RetryPolicy;
use crate::transport::RangedTransport;
use crate::types::{
    ChunkOutcome, ChunkResult, ChunkSpec, NoopProgress, SharedProgress, SourceDescriptor,
};
use crate::utils::staging_path;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Cross-platform positional file write.
///
/// Writes `buf` to `file` at the given byte `offset`, equivalent to Unix `pwrite`.
#[cfg(unix)]
fn write_all_at(file: &std::fs::File, buf: &[u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

/// Cross-platform positional file write.
///
/// Writes `buf` to `file` at the given byte `offset`, equivalent to Unix `pwrite`.
#[cfg(windows)]
fn write_all_at(file: &std::fs::File, buf: &[u8], offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut written = 0;
    while written < buf.len() {
        let n = file.seek_write(&buf[written..], offset + written as u64)?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "failed to write whole buffer",
            ));
        }
        written += n;
    }
    Ok(())
}

#[cfg(not(any(unix, windows)))]
fn write_all_at(_file: &std::fs::File, _buf: &[u8], _offset: u64) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "positional writes not supported on this platform",
    ))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Init,
    Probe,
    ProbeOk,
    ProbeFailed,
    RangeProbe,
    Plan,
    Fetching,
    Finalize,
    Abort,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

struct PhaseTracker<'a> {
    source: &'a SourceDescriptor,
    current: Phase,
}

impl<'a> PhaseTracker<'a> {
    fn new(source: &'a SourceDescriptor) -> Self {
        tracing::debug!(source = %source, phase = %Phase::Init, "chunked transfer started");
        Self {
            source,
            current: Phase::Init,
        }
    }

    fn advance(&mut self, next: Phase) {
        tracing::debug!(
            source = %self.source,
            from = %self.current,
            to = %next,
            "chunked transfer phase"
        );
        self.current = next;
    }
}

/// State shared by every chunk task of one transfer
struct ChunkContext {
    transport: Arc<dyn RangedTransport>,
    source: SourceDescriptor,
    options: TransferOptions,
    policy: RetryPolicy,
    file: Arc<std::fs::File>,
}

/// Drives one chunked transfer from probe to finalize
pub struct ChunkedFetchCoordinator {
    transport: Arc<dyn RangedTransport>,
    progress: SharedProgress,
}

impl ChunkedFetchCoordinator {
    /// Coordinator for a ranged transport, discarding progress
    pub fn new(transport: Arc<dyn RangedTransport>) -> Self {
        Self {
            transport,
            progress: Arc::new(NoopProgress),
        }
    }

    /// Report cumulative bytes written after each chunk completes
    pub fn with_progress(mut self, progress: SharedProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Fetch `source` into `destination` using parallel range requests
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// - [`Error::RangeUnsupported`] when the size is unknown; nothing was written
    /// - [`Error::SizeExceeded`] before any chunk is fetched
    /// - [`Error::ChunkFetch`] when a chunk exhausts its retries
    /// - [`Error::Finalize`] when the staging file cannot be renamed
    pub async fn fetch(
        &self,
        source: &SourceDescriptor,
        destination: &Path,
        options: &TransferOptions,
    ) -> Result<u64> {
        let mut phase = PhaseTracker::new(source);

        let total = self.resolve_size(source, options, &mut phase).await?;
        options.check_size(total)?;

        phase.advance(Phase::Plan);
        let chunks = planner::plan(total, options.chunk_size)?;
        if chunks.is_empty() {
            return Err(Error::RangeUnsupported {
                source_locator: source.locator().to_string(),
            });
        }
        tracing::debug!(
            source = %source,
            total_bytes = total,
            chunk_count = chunks.len(),
            concurrency = options.concurrency,
            "planned chunks"
        );

        let staging = staging_path(destination);
        let file = create_staging(&staging, total).await?;

        phase.advance(Phase::Fetching);
        let fetched = self
            .fetch_chunks(source, &chunks, Arc::clone(&file), total, options)
            .await;

        if let Err(e) = fetched {
            phase.advance(Phase::Abort);
            drop(file);
            remove_staging(&staging).await;
            return Err(e);
        }

        phase.advance(Phase::Finalize);
        finalize(file, &staging, destination).await?;

        phase.advance(Phase::Done);
        Ok(total)
    }

    /// Learn the total size, or report that ranges cannot be used
    async fn resolve_size(
        &self,
        source: &SourceDescriptor,
        options: &TransferOptions,
        phase: &mut PhaseTracker<'_>,
    ) -> Result<u64> {
        let policy = RetryPolicy::from(&options.retry);

        phase.advance(Phase::Probe);
        match policy.run(|| self.transport.probe(source, options)).await {
            Ok(info) => {
                phase.advance(Phase::ProbeOk);
                match info.size {
                    Some(size) if info.accepts_ranges && size > 0 => return Ok(size),
                    _ => tracing::debug!(
                        source = %source,
                        size = ?info.size,
                        accepts_ranges = info.accepts_ranges,
                        "probe did not establish range support"
                    ),
                }
            }
            Err(e) => {
                phase.advance(Phase::ProbeFailed);
                tracing::debug!(source = %source, error = %e, "probe failed");
            }
        }

        phase.advance(Phase::RangeProbe);
        match policy.run(|| self.transport.probe_range(source, options)).await {
            Ok(Some(total)) if total > 0 => Ok(total),
            Ok(_) => Err(Error::RangeUnsupported {
                source_locator: source.locator().to_string(),
            }),
            Err(e) => {
                tracing::debug!(source = %source, error = %e, "range probe failed");
                Err(Error::RangeUnsupported {
                    source_locator: source.locator().to_string(),
                })
            }
        }
    }

    async fn fetch_chunks(
        &self,
        source: &SourceDescriptor,
        chunks: &[ChunkSpec],
        file: Arc<std::fs::File>,
        total: u64,
        options: &TransferOptions,
    ) -> Result<()> {
        let pool = ConcurrencyPool::new(options.concurrency)?;
        let ctx = Arc::new(ChunkContext {
            transport: Arc::clone(&self.transport),
            source: source.clone(),
            options: options.clone(),
            policy: RetryPolicy::from(&options.retry),
            file,
        });

        let tasks = chunks.iter().map(|chunk| {
            let ctx = Arc::clone(&ctx);
            let chunk = *chunk;
            async move { settle(fetch_chunk(&ctx, chunk).await, &chunk) }
        });

        let mut bytes_done = 0u64;
        let progress = Arc::clone(&self.progress);
        pool.run(tasks, |result: &ChunkResult| {
            bytes_done = (bytes_done + result.bytes_written).min(total);
            progress.on_progress(bytes_done, total);
        })
        .await?;

        Ok(())
    }
}

/// Fetch one chunk with retries and write it at its offset
async fn fetch_chunk(ctx: &ChunkContext, chunk: ChunkSpec) -> ChunkResult {
    let fetched = ctx
        .policy
        .run(|| ctx.transport.fetch_range(&ctx.source, &chunk, &ctx.options))
        .await;

    let outcome = match fetched {
        Ok(data) => write_chunk(Arc::clone(&ctx.file), data, chunk.start).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(bytes_written) => ChunkResult {
            index: chunk.index,
            bytes_written,
            outcome: ChunkOutcome::Success,
        },
        Err(e) => {
            tracing::error!(
                source = %ctx.source,
                chunk_index = chunk.index,
                start = chunk.start,
                end = chunk.end,
                error = %e,
                "chunk failed"
            );
            ChunkResult {
                index: chunk.index,
                bytes_written: 0,
                outcome: ChunkOutcome::Failure(e),
            }
        }
    }
}

/// Turn a failed chunk into the error that aborts the transfer
fn settle(result: ChunkResult, chunk: &ChunkSpec) -> Result<ChunkResult> {
    match result.outcome {
        ChunkOutcome::Success => Ok(result),
        ChunkOutcome::Failure(cause) => Err(Error::ChunkFetch {
            index: chunk.index,
            start: chunk.start,
            end: chunk.end,
            cause: Box::new(cause),
        }),
    }
}

async fn write_chunk(file: Arc<std::fs::File>, data: Vec<u8>, offset: u64) -> Result<u64> {
    let len = data.len() as u64;
    tokio::task::spawn_blocking(move || write_all_at(&file, &data, offset))
        .await
        .map_err(|e| Error::Other(format!("chunk write task failed: {e}")))??;
    Ok(len)
}

async fn create_staging(path: &Path, size: u64) -> Result<Arc<std::fs::File>> {
    let path = path.to_path_buf();
    let file = tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.set_len(size)?;
        Ok(file)
    })
    .await
    .map_err(|e| Error::Other(format!("staging file task failed: {e}")))??;
    Ok(Arc::new(file))
}

async fn remove_staging(staging: &Path) {
    match tokio::fs::remove_file(staging).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            staging = %staging.display(),
            error = %e,
            "failed to remove staging file"
        ),
    }
}

/// Flush the staging file and atomically rename it onto the destination
async fn finalize(file: Arc<std::fs::File>, staging: &Path, destination: &Path) -> Result<()> {
    let finalize_error = |reason: String| Error::Finalize {
        staging: staging.to_path_buf(),
        destination: destination.to_path_buf(),
        reason,
    };

    let synced = tokio::task::spawn_blocking(move || file.sync_all()).await;
    let synced = match synced {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(finalize_error(format!("fsync failed: {e}"))),
        Err(e) => Err(finalize_error(format!("fsync task failed: {e}"))),
    };
    let renamed = match synced {
        Ok(()) => tokio::fs::rename(staging, destination)
            .await
            .map_err(|e| finalize_error(e.to_string())),
        Err(e) => Err(e),
    };

    if let Err(e) = renamed {
        remove_staging(staging).await;
        return Err(e);
    }
    Ok(())
}
