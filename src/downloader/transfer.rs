//! Per-source pipeline

use super::Downloader;
use crate::config::TransferOptions;
use crate::coordinator::ChunkedFetchCoordinator;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::transport::Transport;
use crate::types::{
    Event, EventProgress, SourceDescriptor, TransferRequest, TransferResult, TransferTask,
};
use crate::utils::{generate_filename, mime_to_extension};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What a finished source produced
struct Transferred {
    destination: PathBuf,
    filename: String,
    bytes: u64,
}

impl Downloader {
    /// Run one request to completion, converting any error into a failed result
    pub(crate) async fn transfer(
        &self,
        request: TransferRequest,
        destination_dir: &Path,
        options: &TransferOptions,
    ) -> TransferResult {
        let locator = request.source.clone();
        match self.transfer_inner(request, destination_dir, options).await {
            Ok(done) => {
                tracing::info!(
                    source = %locator,
                    destination = %done.destination.display(),
                    bytes = done.bytes,
                    "transfer complete"
                );
                self.emit(Event::TransferComplete {
                    source: locator.clone(),
                    destination: done.destination.clone(),
                    bytes: done.bytes,
                });
                TransferResult::succeeded(locator, done.destination, done.filename, done.bytes)
            }
            Err(e) => {
                tracing::error!(
                    source = %locator,
                    error = %e,
                    error_code = e.error_code(),
                    "transfer failed"
                );
                self.emit_failed(&locator, &e);
                TransferResult::failed(locator, &e)
            }
        }
    }

    async fn transfer_inner(
        &self,
        request: TransferRequest,
        destination_dir: &Path,
        options: &TransferOptions,
    ) -> Result<Transferred> {
        let source = SourceDescriptor::parse(&request.source)?;
        let transport = self.router.route(&source)?;

        let filename = match request.filename {
            Some(name) => checked_filename(&source, name)?,
            None => self.generated_filename(&source, &transport, options).await,
        };
        let task = TransferTask {
            destination: destination_dir.join(&filename),
            filename,
            source,
            options: options.clone(),
        };

        tracing::debug!(
            source = %task.source,
            transport = transport.name(),
            destination = %task.destination.display(),
            "starting transfer"
        );
        self.emit(Event::TransferStarted {
            source: task.source.locator().to_string(),
            destination: task.destination.clone(),
        });

        let bytes = self.fetch(&task, transport).await?;

        if let Err(e) = task.options.check_size(bytes) {
            remove_quietly(&task.destination).await;
            return Err(e);
        }

        self.post.validate(&task.destination).await?;
        let destination = self.post.handle(&task.destination).await?;

        Ok(Transferred {
            destination,
            filename: task.filename,
            bytes,
        })
    }

    /// Chunked when enabled and possible, whole-file otherwise
    async fn fetch(&self, task: &TransferTask, transport: Arc<dyn Transport>) -> Result<u64> {
        let ranged = if task.options.chunked_download && task.source.is_http() {
            Arc::clone(&transport).ranged()
        } else {
            None
        };

        if let Some(ranged) = ranged {
            let progress = Arc::new(EventProgress {
                source: task.source.locator().to_string(),
                event_tx: self.event_tx.clone(),
            });
            let coordinator = ChunkedFetchCoordinator::new(ranged).with_progress(progress);

            match coordinator
                .fetch(&task.source, &task.destination, &task.options)
                .await
            {
                Err(Error::RangeUnsupported { .. }) => {
                    tracing::info!(
                        source = %task.source,
                        "byte ranges unavailable, falling back to whole-file transfer"
                    );
                    self.emit(Event::FallbackToWholeFile {
                        source: task.source.locator().to_string(),
                        reason: "server did not report a size usable for byte ranges"
                            .to_string(),
                    });
                }
                other => return other,
            }
        }

        fetch_whole(task, transport.as_ref()).await
    }

    /// `download_<unique>[.ext]`, the extension taken from the locator path or,
    /// for HTTP sources without one, from the probed media type
    async fn generated_filename(
        &self,
        source: &SourceDescriptor,
        transport: &Arc<dyn Transport>,
        options: &TransferOptions,
    ) -> String {
        if let Some(ext) = source.extension() {
            return generate_filename(Some(&ext));
        }
        if !source.is_http() {
            return generate_filename(None);
        }

        let Some(ranged) = Arc::clone(transport).ranged() else {
            return generate_filename(None);
        };
        let policy = RetryPolicy::from(&options.retry);
        let extension = match policy.run(|| ranged.probe(source, options)).await {
            Ok(info) => info.content_type.as_deref().and_then(mime_to_extension),
            Err(e) => {
                tracing::debug!(source = %source, error = %e, "metadata probe for filename failed");
                None
            }
        };
        generate_filename(extension)
    }
}

/// Whole-file transfer through `<destination>.part`
async fn fetch_whole(task: &TransferTask, transport: &dyn Transport) -> Result<u64> {
    let staging = task.staging_path();

    let bytes = match transport
        .fetch(&task.source, &staging, &task.options)
        .await
    {
        Ok(bytes) => bytes,
        Err(e) => {
            remove_quietly(&staging).await;
            return Err(e);
        }
    };

    if let Err(e) = tokio::fs::rename(&staging, &task.destination).await {
        remove_quietly(&staging).await;
        return Err(Error::Finalize {
            staging,
            destination: task.destination.clone(),
            reason: e.to_string(),
        });
    }
    Ok(bytes)
}

/// Explicit filenames must name a file directly inside the destination directory
fn checked_filename(source: &SourceDescriptor, name: String) -> Result<String> {
    let trimmed = name.trim();
    let plain = Path::new(trimmed)
        .file_name()
        .is_some_and(|f| f == std::ffi::OsStr::new(trimmed));
    if trimmed.is_empty() || !plain || trimmed.contains(['/', '\\']) {
        return Err(Error::InvalidSource {
            source_locator: source.locator().to_string(),
            reason: format!("filename '{name}' must be a plain file name"),
        });
    }
    Ok(trimmed.to_string())
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove file"),
    }
}
