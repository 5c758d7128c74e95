//! Builder for [`Downloader`]

use crate::config::TransferOptions;
use crate::downloader::Downloader;
use crate::error::Result;
use crate::post_transfer::{ContentHandler, PostTransfer, Validator};
use crate::transport::{ProtocolRouter, Transport};
use std::sync::Arc;

enum Registration {
    Defaults,
    Custom(Box<dyn Transport>),
}

/// Builder for [`Downloader`]
///
/// Transports are routed in the order they are registered. When no transport
/// is registered at all, the HTTP, FTP and local transports are used.
///
/// # Examples
///
/// ```no_run
/// use file_dl::post_transfer::{ExtensionValidator, RenameByMediaType, SizeValidator};
/// use file_dl::{Downloader, TransferOptions};
///
/// # fn main() -> file_dl::Result<()> {
/// let options = TransferOptions {
///     user_agent: "archiver/2.0".to_string(),
///     ..TransferOptions::default()
/// };
///
/// let downloader = Downloader::builder()
///     .options(options)
///     .with_default_transports()
///     .validator(SizeValidator::new(Some(1), Some(50 * 1024 * 1024)))
///     .validator(ExtensionValidator::new(Vec::<String>::new(), ["exe", "msi"]))
///     .handler(RenameByMediaType::new())
///     .build()?;
/// # let _ = downloader;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct DownloaderBuilder {
    options: TransferOptions,
    transports: Vec<Registration>,
    post: PostTransfer,
}

impl DownloaderBuilder {
    /// Builder with default options and nothing registered
    pub fn new() -> Self {
        Self::default()
    }

    /// Options used to configure every transport at build time
    pub fn options(mut self, options: TransferOptions) -> Self {
        self.options = options;
        self
    }

    /// Register a transport after those already registered
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transports.push(Registration::Custom(Box::new(transport)));
        self
    }

    /// Register the HTTP, FTP and local transports at this position
    pub fn with_default_transports(mut self) -> Self {
        self.transports.push(Registration::Defaults);
        self
    }

    /// Append a post-transfer validator
    pub fn validator<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.post.add_validator(Arc::new(validator));
        self
    }

    /// Append a content handler
    pub fn handler<H: ContentHandler + 'static>(mut self, handler: H) -> Self {
        self.post.add_handler(Arc::new(handler));
        self
    }

    /// Configure every transport with the options and build the downloader
    pub fn build(self) -> Result<Downloader> {
        self.options.validate()?;

        let registrations = if self.transports.is_empty() {
            vec![Registration::Defaults]
        } else {
            self.transports
        };

        let mut router = ProtocolRouter::new();
        for registration in registrations {
            match registration {
                Registration::Defaults => {
                    let defaults = ProtocolRouter::with_default_transports(&self.options)?;
                    for transport in defaults.transports() {
                        router.register_arc(Arc::clone(transport));
                    }
                }
                Registration::Custom(mut transport) => {
                    transport.configure(&self.options)?;
                    router.register_arc(Arc::from(transport));
                }
            }
        }

        tracing::debug!(
            transports = ?router.names(),
            validators = self.post.validator_count(),
            handlers = self.post.handler_count(),
            "downloader built"
        );
        Ok(Downloader::from_parts(router, self.post))
    }
}

impl std::fmt::Debug for DownloaderBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let transports: Vec<&str> = self
            .transports
            .iter()
            .map(|r| match r {
                Registration::Defaults => "<defaults>",
                Registration::Custom(t) => t.name(),
            })
            .collect();
        f.debug_struct("DownloaderBuilder")
            .field("options", &self.options)
            .field("transports", &transports)
            .field("post", &self.post)
            .finish()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::post_transfer::{RenameByMediaType, SizeValidator};
    use crate::types::SourceDescriptor;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Claims every source; records whether `configure` ran
    struct Catchall {
        configured: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Transport for Catchall {
        fn name(&self) -> &'static str {
            "catchall"
        }

        fn supports(&self, _source: &SourceDescriptor) -> bool {
            true
        }

        fn configure(&mut self, _options: &TransferOptions) -> Result<()> {
            self.configured.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn fetch(
            &self,
            _source: &SourceDescriptor,
            destination: &Path,
            _options: &TransferOptions,
        ) -> Result<u64> {
            tokio::fs::write(destination, b"caught").await?;
            Ok(6)
        }
    }

    #[test]
    fn empty_builder_uses_default_transports() {
        let downloader = DownloaderBuilder::new().build().unwrap();
        let names: Vec<_> = downloader.transports().iter().map(|t| t.name()).collect();
        assert_eq!(names, ["http", "ftp", "local"]);
    }

    #[test]
    fn registration_order_is_routing_order() {
        let configured = Arc::new(AtomicBool::new(false));
        let downloader = DownloaderBuilder::new()
            .transport(Catchall {
                configured: Arc::clone(&configured),
            })
            .with_default_transports()
            .validator(SizeValidator::default())
            .handler(RenameByMediaType::new())
            .build()
            .unwrap();

        assert!(configured.load(Ordering::SeqCst), "configure must run at build");
        let names: Vec<_> = downloader.transports().iter().map(|t| t.name()).collect();
        assert_eq!(names, ["catchall", "http", "ftp", "local"]);
        assert_eq!(downloader.post_transfer().validator_count(), 1);
        assert_eq!(downloader.post_transfer().handler_count(), 1);
    }

    #[tokio::test]
    async fn custom_transport_wins_routing() {
        let out = tempfile::tempdir().unwrap();
        let downloader = DownloaderBuilder::new()
            .transport(Catchall {
                configured: Arc::new(AtomicBool::new(false)),
            })
            .build()
            .unwrap();

        let result = downloader
            .download_one("http://example.invalid/a.txt", out.path(), &TransferOptions::default())
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(std::fs::read(result.destination.unwrap()).unwrap(), b"caught");
    }

    #[test]
    fn invalid_options_fail_the_build() {
        let result = DownloaderBuilder::new()
            .options(TransferOptions {
                concurrency: 0,
                ..TransferOptions::default()
            })
            .build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
