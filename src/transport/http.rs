//! HTTP and HTTPS transport built on pooled `reqwest::Client`s

use super::{RangedTransport, Transport};
use crate::config::TransferOptions;
use crate::error::{Error, Result, TransportError};
use crate::retry::RetryPolicy;
use crate::types::{ChunkSpec, ResourceInfo, SourceDescriptor};
use async_trait::async_trait;
use futures::StreamExt;
use regex::Regex;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Transport for `http://` and `https://` sources
///
/// Redirect policy and connect timeout are fixed when a `reqwest::Client` is
/// built, so the transport keeps one client per distinct pair of those settings
/// and picks it from the options passed to each call. Requests that share the
/// settings share a client and its connection pool. User agent, per-request
/// timeout and extra headers are applied to every request individually.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    clients: Arc<Mutex<HashMap<ClientKey, reqwest::Client>>>,
}

/// Client-level settings taken from [`TransferOptions`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct ClientKey {
    max_redirects: usize,
    connect_timeout: Duration,
}

impl ClientKey {
    fn of(options: &TransferOptions) -> Self {
        Self {
            max_redirects: options.max_redirects,
            connect_timeout: options.connect_timeout,
        }
    }
}

impl HttpTransport {
    /// Create a transport with a client ready for the given options
    pub fn new(options: &TransferOptions) -> Result<Self> {
        let key = ClientKey::of(options);
        let client = build_client(key)?;
        Ok(Self {
            clients: Arc::new(Mutex::new(HashMap::from([(key, client)]))),
        })
    }

    /// Metadata for a resource via a HEAD request
    ///
    /// Retried per `options.retry`.
    pub async fn file_info(
        &self,
        source: &SourceDescriptor,
        options: &TransferOptions,
    ) -> Result<ResourceInfo> {
        let policy = RetryPolicy::from(&options.retry);
        policy.run(|| self.head(source, options)).await
    }

    async fn client_for(&self, options: &TransferOptions) -> Result<reqwest::Client> {
        let key = ClientKey::of(options);
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let client = build_client(key)?;
        tracing::debug!(
            max_redirects = key.max_redirects,
            connect_timeout_ms = key.connect_timeout.as_millis() as u64,
            "created HTTP client"
        );
        clients.insert(key, client.clone());
        Ok(client)
    }

    async fn request(
        &self,
        method: Method,
        url: &url::Url,
        options: &TransferOptions,
    ) -> Result<reqwest::RequestBuilder> {
        let user_agent = HeaderValue::from_str(&options.user_agent)
            .map_err(|e| Error::config("user_agent", format!("invalid user agent: {e}")))?;
        Ok(self
            .client_for(options)
            .await?
            .request(method, url.clone())
            .timeout(options.timeout)
            .header(header::USER_AGENT, user_agent)
            .headers(extra_headers(options)?))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        request
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Network(e)))
    }

    async fn head(
        &self,
        source: &SourceDescriptor,
        options: &TransferOptions,
    ) -> Result<ResourceInfo> {
        let url = http_url(source)?;
        let response = self.send(self.request(Method::HEAD, url, options).await?).await?;
        let response = ensure_success(response)?;
        Ok(resource_info(response.headers()))
    }

    async fn fetch_once(
        &self,
        url: &url::Url,
        destination: &Path,
        options: &TransferOptions,
    ) -> Result<u64> {
        let response = self.send(self.request(Method::GET, url, options).await?).await?;
        let response = ensure_success(response)?;

        if let Some(length) = content_length(response.headers()) {
            options.check_size(length)?;
        }

        let mut file = tokio::fs::File::create(destination).await?;
        let mut body = response.bytes_stream();
        let mut written = 0u64;

        while let Some(piece) = body.next().await {
            let piece = piece.map_err(TransportError::Network)?;
            written += piece.len() as u64;
            options.check_size(written)?;
            file.write_all(&piece).await?;
        }
        file.flush().await?;

        tracing::debug!(url = %url, bytes = written, "streamed response body");
        Ok(written)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    fn supports(&self, source: &SourceDescriptor) -> bool {
        source.is_http()
    }

    fn configure(&mut self, options: &TransferOptions) -> Result<()> {
        *self = Self::new(options)?;
        Ok(())
    }

    async fn fetch(
        &self,
        source: &SourceDescriptor,
        destination: &Path,
        options: &TransferOptions,
    ) -> Result<u64> {
        let url = http_url(source)?;
        let policy = RetryPolicy::from(&options.retry);
        policy
            .run(|| self.fetch_once(url, destination, options))
            .await
    }

    fn ranged(self: Arc<Self>) -> Option<Arc<dyn RangedTransport>> {
        Some(self)
    }
}

#[async_trait]
impl RangedTransport for HttpTransport {
    async fn probe(
        &self,
        source: &SourceDescriptor,
        options: &TransferOptions,
    ) -> Result<ResourceInfo> {
        self.head(source, options).await
    }

    async fn probe_range(
        &self,
        source: &SourceDescriptor,
        options: &TransferOptions,
    ) -> Result<Option<u64>> {
        let url = http_url(source)?;
        let request = self
            .request(Method::GET, url, options)
            .await?
            .header(header::RANGE, "bytes=0-0");
        let response = self.send(request).await?;

        if response.status() != StatusCode::PARTIAL_CONTENT {
            tracing::debug!(
                source = %source,
                status = response.status().as_u16(),
                "range probe answered without partial content"
            );
            return Ok(None);
        }

        let total = response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_probe_content_range);
        Ok(total)
    }

    async fn fetch_range(
        &self,
        source: &SourceDescriptor,
        chunk: &ChunkSpec,
        options: &TransferOptions,
    ) -> Result<Vec<u8>> {
        let url = http_url(source)?;
        let request = self
            .request(Method::GET, url, options)
            .await?
            .header(header::RANGE, chunk.range_header());
        let response = ensure_success(self.send(request).await?)?;

        if response.status() != StatusCode::PARTIAL_CONTENT {
            return Err(TransportError::ContentMismatch {
                expected: format!("206 Partial Content for {}", chunk.range_header()),
                actual: response.status().to_string(),
            }
            .into());
        }

        let served = response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range);
        if served != Some((chunk.start, chunk.end)) {
            return Err(TransportError::ContentMismatch {
                expected: format!("Content-Range bytes {}-{}", chunk.start, chunk.end),
                actual: header_string(response.headers(), header::CONTENT_RANGE)
                    .unwrap_or_else(|| "no Content-Range".to_string()),
            }
            .into());
        }

        let mut body = Vec::with_capacity(usize::try_from(chunk.size).unwrap_or(0));
        let mut stream = response.bytes_stream();
        while let Some(piece) = stream.next().await {
            let piece = piece.map_err(TransportError::Network)?;
            if (body.len() + piece.len()) as u64 > chunk.size {
                return Err(TransportError::ContentMismatch {
                    expected: format!("{} bytes", chunk.size),
                    actual: format!("more than {} bytes", chunk.size),
                }
                .into());
            }
            body.extend_from_slice(&piece);
        }

        if body.len() as u64 != chunk.size {
            return Err(TransportError::ContentMismatch {
                expected: format!("{} bytes", chunk.size),
                actual: format!("{} bytes", body.len()),
            }
            .into());
        }
        Ok(body)
    }
}

fn build_client(key: ClientKey) -> Result<reqwest::Client> {
    let redirect = if key.max_redirects == 0 {
        reqwest::redirect::Policy::none()
    } else {
        reqwest::redirect::Policy::limited(key.max_redirects)
    };

    reqwest::Client::builder()
        .connect_timeout(key.connect_timeout)
        .redirect(redirect)
        .build()
        .map_err(|e| Error::Other(format!("failed to create HTTP client: {e}")))
}

fn extra_headers(options: &TransferOptions) -> Result<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(options.headers.len());
    for (name, value) in &options.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::config("headers", format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::config("headers", format!("invalid header value: {e}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn http_url(source: &SourceDescriptor) -> Result<&url::Url> {
    source
        .url()
        .filter(|_| source.is_http())
        .ok_or_else(|| Error::InvalidSource {
            source_locator: source.locator().to_string(),
            reason: "not an http(s) URL".to_string(),
        })
}

fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(TransportError::Status {
        status: status.as_u16(),
        url: response.url().to_string(),
    }
    .into())
}

// `Response::content_length` reports the body size hint, which is zero for HEAD
fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn resource_info(headers: &HeaderMap) -> ResourceInfo {
    let accepts_ranges = headers
        .get_all(header::ACCEPT_RANGES)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|unit| unit.trim().eq_ignore_ascii_case("bytes"));

    let last_modified = header_string(headers, header::LAST_MODIFIED)
        .and_then(|v| chrono::DateTime::parse_from_rfc2822(&v).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc));

    ResourceInfo {
        size: content_length(headers),
        accepts_ranges,
        content_type: header_string(headers, header::CONTENT_TYPE),
        last_modified,
        etag: header_string(headers, header::ETAG),
    }
}

fn probe_range_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^bytes\s+0-0/(\d+)$").ok())
        .as_ref()
}

fn content_range_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^bytes\s+(\d+)-(\d+)/(?:\d+|\*)$").ok())
        .as_ref()
}

/// Total size from a `Content-Range: bytes 0-0/<total>` probe answer
fn parse_probe_content_range(value: &str) -> Option<u64> {
    let captures = probe_range_pattern()?.captures(value.trim())?;
    captures.get(1)?.as_str().parse().ok()
}

/// Served `(start, end)` from a `Content-Range: bytes <start>-<end>/<total>` header
fn parse_content_range(value: &str) -> Option<(u64, u64)> {
    let captures = content_range_pattern()?.captures(value.trim())?;
    let start = captures.get(1)?.as_str().parse().ok()?;
    let end = captures.get(2)?.as_str().parse().ok()?;
    Some((start, end))
}
