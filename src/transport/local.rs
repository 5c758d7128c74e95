//! Local filesystem transport for `file://` locators and bare paths

use super::Transport;
use crate::config::TransferOptions;
use crate::error::{Error, Result, TransportError};
use crate::types::SourceDescriptor;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Copies files already reachable on the local filesystem
///
/// Never routed through the chunked engine: a local copy gains nothing from
/// byte ranges.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalTransport;

impl LocalTransport {
    /// Create the transport
    pub fn new() -> Self {
        Self
    }
}

fn local_path(source: &SourceDescriptor) -> Result<PathBuf> {
    match source.url() {
        Some(url) => url.to_file_path().map_err(|()| Error::InvalidSource {
            source_locator: source.locator().to_string(),
            reason: "file URL does not name a local path".to_string(),
        }),
        None => Ok(PathBuf::from(source.locator())),
    }
}

#[async_trait]
impl Transport for LocalTransport {
    fn name(&self) -> &'static str {
        "local"
    }

    fn supports(&self, source: &SourceDescriptor) -> bool {
        matches!(source.scheme(), None | Some("file"))
    }

    async fn fetch(
        &self,
        source: &SourceDescriptor,
        destination: &Path,
        options: &TransferOptions,
    ) -> Result<u64> {
        let path = local_path(source)?;

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TransportError::NotFound(path).into());
            }
            Err(e) => return Err(TransportError::Io(e).into()),
        };
        if !metadata.is_file() {
            return Err(Error::InvalidSource {
                source_locator: source.locator().to_string(),
                reason: "not a regular file".to_string(),
            });
        }
        options.check_size(metadata.len())?;

        let bytes = tokio::fs::copy(&path, destination)
            .await
            .map_err(TransportError::Io)?;
        tracing::debug!(from = %path.display(), to = %destination.display(), bytes, "copied local file");
        Ok(bytes)
    }
}
