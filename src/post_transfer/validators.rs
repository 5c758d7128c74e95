//! Built-in validators

use super::Validator;
use crate::utils::{detect_media_type, format_bytes};
use async_trait::async_trait;
use std::path::Path;

/// Rejects files outside an inclusive size range
#[derive(Clone, Debug, Default)]
pub struct SizeValidator {
    min: Option<u64>,
    max: Option<u64>,
}

impl SizeValidator {
    /// Validator with optional lower and upper bounds in bytes
    pub fn new(min: Option<u64>, max: Option<u64>) -> Self {
        Self { min, max }
    }
}

#[async_trait]
impl Validator for SizeValidator {
    fn name(&self) -> &str {
        "size"
    }

    async fn validate(&self, path: &Path) -> Result<(), String> {
        let size = tokio::fs::metadata(path)
            .await
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?
            .len();

        if let Some(min) = self.min
            && size < min
        {
            return Err(format!(
                "file size ({}) is less than minimum required size ({})",
                format_bytes(size),
                format_bytes(min)
            ));
        }
        if let Some(max) = self.max
            && size > max
        {
            return Err(format!(
                "file size ({}) exceeds maximum allowed size ({})",
                format_bytes(size),
                format_bytes(max)
            ));
        }
        Ok(())
    }
}

/// Allow/block lists of file extensions, compared case-insensitively
///
/// The block list is checked first. An empty allow list allows everything not
/// blocked.
#[derive(Clone, Debug, Default)]
pub struct ExtensionValidator {
    allowed: Vec<String>,
    blocked: Vec<String>,
}

impl ExtensionValidator {
    /// Validator from allow and block lists (leading dots are ignored)
    pub fn new<A, B>(allowed: A, blocked: B) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        B: IntoIterator,
        B::Item: AsRef<str>,
    {
        Self {
            allowed: allowed.into_iter().map(normalize_extension).collect(),
            blocked: blocked.into_iter().map(normalize_extension).collect(),
        }
    }
}

fn normalize_extension(ext: impl AsRef<str>) -> String {
    ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase()
}

#[async_trait]
impl Validator for ExtensionValidator {
    fn name(&self) -> &str {
        "extension"
    }

    async fn validate(&self, path: &Path) -> Result<(), String> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(normalize_extension)
            .unwrap_or_default();

        if self.blocked.contains(&extension) {
            return Err(format!("file extension '{extension}' is not allowed"));
        }
        if !self.allowed.is_empty() && !self.allowed.contains(&extension) {
            return Err(format!(
                "file extension '{extension}' is not allowed; allowed extensions: {}",
                self.allowed.join(", ")
            ));
        }
        Ok(())
    }
}

/// Allow/block lists of media types, checked against the sniffed type
#[derive(Clone, Debug, Default)]
pub struct MediaTypeValidator {
    allowed: Vec<String>,
    blocked: Vec<String>,
}

impl MediaTypeValidator {
    /// Validator from allow and block lists of media types
    pub fn new<A, B>(allowed: A, blocked: B) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        B: IntoIterator,
        B::Item: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(|m| m.into().to_ascii_lowercase()).collect(),
            blocked: blocked.into_iter().map(|m| m.into().to_ascii_lowercase()).collect(),
        }
    }
}

#[async_trait]
impl Validator for MediaTypeValidator {
    fn name(&self) -> &str {
        "media_type"
    }

    async fn validate(&self, path: &Path) -> Result<(), String> {
        let media_type = detect_media_type(path)
            .await
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;

        if self.blocked.contains(&media_type) {
            return Err(format!("media type '{media_type}' is not allowed"));
        }
        if !self.allowed.is_empty() && !self.allowed.contains(&media_type) {
            return Err(format!(
                "media type '{media_type}' is not allowed; allowed media types: {}",
                self.allowed.join(", ")
            ));
        }
        Ok(())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn file_with(dir: &tempfile::TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn size_bounds_are_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let path = file_with(&dir, "ten.bin", &[0u8; 10]);

        assert!(SizeValidator::new(Some(10), Some(10)).validate(&path).await.is_ok());
        let too_big = SizeValidator::new(None, Some(9)).validate(&path).await.unwrap_err();
        assert!(too_big.contains("exceeds maximum"), "{too_big}");
        assert!(SizeValidator::new(Some(11), None).validate(&path).await.is_err());
    }

    #[tokio::test]
    async fn missing_file_fails_size_validation() {
        let dir = tempfile::tempdir().unwrap();
        let result = SizeValidator::default()
            .validate(&dir.path().join("absent"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn blocked_extension_wins_over_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let exe = file_with(&dir, "setup.EXE", b"MZ");
        let pdf = file_with(&dir, "report.pdf", b"%PDF-1.7");

        let validator = ExtensionValidator::new([".exe", "pdf"], ["exe"]);
        let err = validator.validate(&exe).await.unwrap_err();
        assert!(err.contains("'exe' is not allowed"), "{err}");
        assert!(validator.validate(&pdf).await.is_ok());
    }

    #[tokio::test]
    async fn allow_list_restricts_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let txt = file_with(&dir, "notes.txt", b"hi");
        let bare = file_with(&dir, "README", b"hi");

        let validator = ExtensionValidator::new(["jpg", "png"], Vec::<String>::new());
        let err = validator.validate(&txt).await.unwrap_err();
        assert!(err.contains("jpg, png"), "{err}");
        assert!(validator.validate(&bare).await.is_err());

        let open = ExtensionValidator::default();
        assert!(open.validate(&txt).await.is_ok());
    }

    #[tokio::test]
    async fn media_type_uses_sniffed_content() {
        let dir = tempfile::tempdir().unwrap();
        let disguised = file_with(&dir, "photo.txt", b"\xff\xd8\xff\xe0JFIF");

        let images_only = MediaTypeValidator::new(["image/jpeg", "image/png"], Vec::<String>::new());
        assert!(images_only.validate(&disguised).await.is_ok());

        let no_jpeg = MediaTypeValidator::new(Vec::<String>::new(), ["IMAGE/JPEG"]);
        let err = no_jpeg.validate(&disguised).await.unwrap_err();
        assert!(err.contains("image/jpeg"), "{err}");
    }
}
