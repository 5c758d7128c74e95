//! HTTP fixtures: a byte-range capable responder and mock mounting helpers

use file_dl::TransferOptions;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Deterministic body of `len` bytes that differs at every offset mod 251
pub fn patterned_body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Options with fast retries, suitable for mock servers
pub fn quick_options() -> TransferOptions {
    let mut options = TransferOptions::default();
    options.retry.max_attempts = 2;
    options.retry.initial_delay = Duration::from_millis(5);
    options.retry.max_delay = Duration::from_millis(20);
    options
}

/// Options enabling the chunked engine
pub fn chunked_options(chunk_size: u64, concurrency: usize) -> TransferOptions {
    TransferOptions {
        chunked_download: true,
        chunk_size,
        concurrency,
        ..quick_options()
    }
}

/// Serves `Range: bytes=a-b` requests from a fixed body
///
/// Requests without a range get the whole body with 200. Ranges starting at
/// or after `fail_from` are answered with 403.
pub struct RangeResponder {
    body: Vec<u8>,
    fail_from: Option<u64>,
}

impl RangeResponder {
    /// Responder honouring every range
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            fail_from: None,
        }
    }

    /// Responder refusing ranges that start at or after `offset`
    pub fn failing_from(body: Vec<u8>, offset: u64) -> Self {
        Self {
            body,
            fail_from: Some(offset),
        }
    }
}

fn parse_range(value: &str) -> Option<(u64, u64)> {
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    Some((start.trim().parse().ok()?, end.trim().parse().ok()?))
}

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let total = self.body.len() as u64;
        let range = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_range);

        let Some((start, end)) = range else {
            return ResponseTemplate::new(200).set_body_bytes(self.body.clone());
        };
        if self.fail_from.is_some_and(|offset| start >= offset) {
            return ResponseTemplate::new(403);
        }
        if start >= total {
            return ResponseTemplate::new(416)
                .insert_header("Content-Range", format!("bytes */{total}").as_str());
        }

        let end = end.min(total - 1);
        ResponseTemplate::new(206)
            .insert_header(
                "Content-Range",
                format!("bytes {start}-{end}/{total}").as_str(),
            )
            .set_body_bytes(self.body[start as usize..=end as usize].to_vec())
    }
}

/// Mount HEAD and ranged GET handlers for `route`
pub async fn mount_ranged(server: &MockServer, route: &str, responder: RangeResponder) {
    let len = responder.body.len();
    Mock::given(method("HEAD"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Accept-Ranges", "bytes")
                .set_body_bytes(vec![0u8; len]),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(responder)
        .mount(server)
        .await;
}

/// Mount a resource whose server neither advertises nor honours ranges
pub async fn mount_whole_only(server: &MockServer, route: &str, body: Vec<u8>) {
    Mock::given(method("HEAD"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; body.len()]))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

/// Full URL for a route on the mock server
pub fn url(server: &MockServer, route: &str) -> String {
    format!("{}{}", server.uri(), route)
}
