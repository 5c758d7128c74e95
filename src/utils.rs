//! Utility functions for file naming, staging paths, and media types

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Suffix appended to a destination while its transfer is in progress
pub const STAGING_SUFFIX: &str = ".part";

/// Number of leading bytes inspected when sniffing a media type
const SNIFF_LEN: usize = 16;

/// Fallback media type when nothing more specific is known
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Staging path for a destination: `<destination>.part`
///
/// # Examples
///
/// ```
/// use file_dl::utils::staging_path;
/// use std::path::Path;
///
/// assert_eq!(
///     staging_path(Path::new("/tmp/file.bin")),
///     Path::new("/tmp/file.bin.part")
/// );
/// ```
pub fn staging_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(destination.as_os_str());
    name.push(STAGING_SUFFIX);
    PathBuf::from(name)
}

/// Generate a unique filename of the form `download_<unique>[.<ext>]`
///
/// The unique part combines the current time in microseconds with random bits,
/// so two calls within the same process never collide in practice.
pub fn generate_filename(extension: Option<&str>) -> String {
    let micros = chrono::Utc::now().timestamp_micros();
    let salt: u32 = rand::random();
    match extension.filter(|e| !e.is_empty()) {
        Some(ext) => format!("download_{micros:x}{salt:08x}.{ext}"),
        None => format!("download_{micros:x}{salt:08x}"),
    }
}

/// Human-readable byte count with binary units, e.g. `1.5 MB`
///
/// # Examples
///
/// ```
/// use file_dl::utils::format_bytes;
///
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(1536), "1.5 KB");
/// assert_eq!(format_bytes(100 * 1024 * 1024), "100 MB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        return format!("{bytes} B");
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", UNITS[unit])
}

/// Map a media type (optionally with parameters) to a file extension
///
/// # Examples
///
/// ```
/// use file_dl::utils::mime_to_extension;
///
/// assert_eq!(mime_to_extension("image/png"), Some("png"));
/// assert_eq!(mime_to_extension("text/html; charset=utf-8"), Some("html"));
/// assert_eq!(mime_to_extension("application/x-unknown"), None);
/// ```
#[must_use]
pub fn mime_to_extension(media_type: &str) -> Option<&'static str> {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let ext = match essence.as_str() {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        "application/zip" => "zip",
        "application/x-rar-compressed" | "application/vnd.rar" => "rar",
        "application/gzip" | "application/x-gzip" => "gz",
        "text/plain" => "txt",
        "text/html" => "html",
        "text/css" => "css",
        "application/json" => "json",
        "application/xml" | "text/xml" => "xml",
        "application/javascript" | "text/javascript" => "js",
        _ => return None,
    };
    Some(ext)
}

/// Map a file extension to a media type
#[must_use]
pub fn extension_to_mime(extension: &str) -> Option<&'static str> {
    let mime = match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "rar" => "application/x-rar-compressed",
        "gz" => "application/gzip",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        _ => return None,
    };
    Some(mime)
}

/// Detect the media type of a file on disk
///
/// Leading magic bytes decide first; the file extension is the fallback, and
/// `application/octet-stream` is returned when neither matches.
pub async fn detect_media_type(path: &Path) -> std::io::Result<String> {
    use tokio::io::AsyncReadExt;

    let mut file = tokio::fs::File::open(path).await?;
    let mut head = [0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < SNIFF_LEN {
        let n = file.read(&mut head[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    if let Some(mime) = sniff_magic(&head[..filled]) {
        return Ok(mime.to_string());
    }

    let by_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(extension_to_mime);
    Ok(by_extension.unwrap_or(OCTET_STREAM).to_string())
}

fn sniff_magic(head: &[u8]) -> Option<&'static str> {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"%PDF-", "application/pdf"),
        (b"PK\x03\x04", "application/zip"),
        (b"Rar!\x1a\x07", "application/x-rar-compressed"),
        (b"\x1f\x8b", "application/gzip"),
    ];

    for &(magic, mime) in SIGNATURES {
        if head.starts_with(magic) {
            return Some(mime);
        }
    }
    if head.len() >= 12 && head.starts_with(b"RIFF") && &head[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    None
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_path_appends_part_suffix() {
        assert_eq!(
            staging_path(Path::new("downloads/archive.tar.gz")),
            PathBuf::from("downloads/archive.tar.gz.part")
        );
        assert_eq!(
            staging_path(Path::new("noext")),
            PathBuf::from("noext.part")
        );
    }

    #[test]
    fn generated_filenames_carry_extension_and_are_unique() {
        let a = generate_filename(Some("zip"));
        let b = generate_filename(Some("zip"));

        assert!(a.starts_with("download_"));
        assert!(a.ends_with(".zip"));
        assert_ne!(a, b, "two generated names must differ");
    }

    #[test]
    fn generated_filename_without_extension_has_no_dot() {
        let name = generate_filename(None);
        assert!(!name.contains('.'));

        let name = generate_filename(Some(""));
        assert!(!name.contains('.'), "empty extension must be ignored");
    }

    #[test]
    fn format_bytes_uses_binary_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1024), "1 KB");
        assert_eq!(format_bytes(1_048_576 + 524_288), "1.5 MB");
        assert_eq!(format_bytes(5 * 1024u64.pow(5)), "5120 TB");
    }

    #[test]
    fn mime_mapping_ignores_parameters_and_case() {
        assert_eq!(mime_to_extension("Application/JSON; charset=utf-8"), Some("json"));
        assert_eq!(extension_to_mime("JPEG"), Some("image/jpeg"));
        assert_eq!(extension_to_mime("exe"), None);
    }

    #[tokio::test]
    async fn detects_png_by_magic_bytes_despite_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("picture.txt");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR").unwrap();

        assert_eq!(detect_media_type(&path).await.unwrap(), "image/png");
    }

    #[tokio::test]
    async fn falls_back_to_extension_then_octet_stream() {
        let dir = tempfile::tempdir().unwrap();

        let json = dir.path().join("data.json");
        std::fs::write(&json, br#"{"a":1}"#).unwrap();
        assert_eq!(detect_media_type(&json).await.unwrap(), "application/json");

        let unknown = dir.path().join("blob.bin");
        std::fs::write(&unknown, [0u8, 1, 2, 3]).unwrap();
        assert_eq!(detect_media_type(&unknown).await.unwrap(), OCTET_STREAM);
    }

    #[tokio::test]
    async fn empty_file_uses_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.html");
        std::fs::write(&path, b"").unwrap();

        assert_eq!(detect_media_type(&path).await.unwrap(), "text/html");
    }
}
