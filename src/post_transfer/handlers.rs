//! Built-in content handlers

use super::ContentHandler;
use crate::error::Result;
use crate::utils::{detect_media_type, extension_to_mime, mime_to_extension};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Gives a file the extension matching its sniffed media type
///
/// `photo.txt` holding JPEG data becomes `photo.jpg`; `photo.jpeg` is left
/// alone. An existing file at the new name is never overwritten.
#[derive(Clone, Copy, Debug, Default)]
pub struct RenameByMediaType;

impl RenameByMediaType {
    /// Create the handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContentHandler for RenameByMediaType {
    fn name(&self) -> &str {
        "rename_by_media_type"
    }

    fn supports(&self, media_type: &str) -> bool {
        mime_to_extension(media_type).is_some()
    }

    async fn process(&self, path: &Path) -> Result<PathBuf> {
        let media_type = detect_media_type(path).await?;
        let Some(extension) = mime_to_extension(&media_type) else {
            return Ok(path.to_path_buf());
        };

        let current = path.extension().and_then(|e| e.to_str());
        if current.and_then(extension_to_mime) == Some(media_type.as_str()) {
            return Ok(path.to_path_buf());
        }

        let renamed = path.with_extension(extension);
        if tokio::fs::try_exists(&renamed).await? {
            tracing::warn!(
                path = %path.display(),
                target = %renamed.display(),
                "target name already taken, keeping original name"
            );
            return Ok(path.to_path_buf());
        }

        tokio::fs::rename(path, &renamed).await?;
        tracing::debug!(from = %path.display(), to = %renamed.display(), %media_type, "renamed by media type");
        Ok(renamed)
    }
}
