//! Post-transfer pipeline: validate the finished file, then hand it to a content handler
//!
//! Runs once per successful transfer, after the file is at its destination:
//! 1. Validate - every registered [`Validator`] in order; the first rejection
//!    deletes the file and fails the source
//! 2. Handle - the media type is sniffed and the first [`ContentHandler`] that
//!    supports it transforms the file, possibly moving it

use crate::error::{Error, Result};
use crate::utils::detect_media_type;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod handlers;
mod validators;

pub use handlers::RenameByMediaType;
pub use validators::{ExtensionValidator, MediaTypeValidator, SizeValidator};

/// Check applied to a finished file
///
/// # Examples
///
/// ```no_run
/// use async_trait::async_trait;
/// use file_dl::post_transfer::Validator;
/// use std::path::Path;
///
/// struct NonEmpty;
///
/// #[async_trait]
/// impl Validator for NonEmpty {
///     fn name(&self) -> &str {
///         "non-empty"
///     }
///
///     async fn validate(&self, path: &Path) -> Result<(), String> {
///         let len = tokio::fs::metadata(path).await.map_err(|e| e.to_string())?.len();
///         if len == 0 { Err("file is empty".into()) } else { Ok(()) }
///     }
/// }
/// ```
#[async_trait]
pub trait Validator: Send + Sync {
    /// Name reported in validation errors
    fn name(&self) -> &str;

    /// Accept the file, or explain why it is rejected
    async fn validate(&self, path: &Path) -> std::result::Result<(), String>;
}

/// Transformation applied to a finished file of a supported media type
#[async_trait]
pub trait ContentHandler: Send + Sync {
    /// Name reported in handler errors
    fn name(&self) -> &str;

    /// Whether the handler wants files of this media type
    fn supports(&self, media_type: &str) -> bool;

    /// Process the file, returning its final path
    async fn process(&self, path: &Path) -> Result<PathBuf>;
}

/// Ordered validators and content handlers
#[derive(Clone, Default)]
pub struct PostTransfer {
    validators: Vec<Arc<dyn Validator>>,
    handlers: Vec<Arc<dyn ContentHandler>>,
}

impl PostTransfer {
    /// Pipeline with no validators or handlers
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a validator
    pub fn add_validator(&mut self, validator: Arc<dyn Validator>) {
        self.validators.push(validator);
    }

    /// Append a content handler
    pub fn add_handler(&mut self, handler: Arc<dyn ContentHandler>) {
        self.handlers.push(handler);
    }

    /// Number of registered validators
    pub fn validator_count(&self) -> usize {
        self.validators.len()
    }

    /// Number of registered content handlers
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Run every validator; on the first rejection remove the file
    pub async fn validate(&self, path: &Path) -> Result<()> {
        for validator in &self.validators {
            if let Err(reason) = validator.validate(path).await {
                tracing::warn!(
                    path = %path.display(),
                    validator = validator.name(),
                    reason = %reason,
                    "validation failed, removing file"
                );
                if let Err(e) = tokio::fs::remove_file(path).await {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove rejected file");
                }
                return Err(Error::Validation {
                    validator: validator.name().to_string(),
                    reason,
                });
            }
        }
        Ok(())
    }

    /// Pass the file to the first handler supporting its media type
    ///
    /// Returns the handler's output path, or `path` unchanged when none applies.
    pub async fn handle(&self, path: &Path) -> Result<PathBuf> {
        if self.handlers.is_empty() {
            return Ok(path.to_path_buf());
        }

        let media_type = detect_media_type(path).await?;
        let Some(handler) = self.handlers.iter().find(|h| h.supports(&media_type)) else {
            return Ok(path.to_path_buf());
        };

        tracing::debug!(
            path = %path.display(),
            media_type = %media_type,
            handler = handler.name(),
            "processing content"
        );
        handler.process(path).await.map_err(|e| match e {
            Error::ContentHandler { .. } => e,
            other => Error::ContentHandler {
                handler: handler.name().to_string(),
                reason: other.to_string(),
            },
        })
    }
}

impl std::fmt::Debug for PostTransfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostTransfer")
            .field(
                "validators",
                &self.validators.iter().map(|v| v.name()).collect::<Vec<_>>(),
            )
            .field(
                "handlers",
                &self.handlers.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
