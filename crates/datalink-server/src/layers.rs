//! Request middleware: the length guard and byte-rate accounting.
//!
//! Sizes are estimated from the HTTP/1.1 wire form of the head plus the
//! declared or known body length. Chunked bodies of unknown length count
//! only their head.

use axum::body::HttpBody;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::error::DataLinkError;
use crate::state::AppState;

/// `": "` plus `"\r\n"` around every header line.
const HEADER_OVERHEAD: u64 = 4;

/// `" HTTP/1.1\r\n"` after the request target, plus the blank line.
const REQUEST_LINE_OVERHEAD: u64 = 13;

/// `"HTTP/1.1 200 OK\r\n"` plus the blank line.
const STATUS_LINE_OVERHEAD: u64 = 19;

/// Reject requests whose head plus declared body exceeds
/// `max_request_length`.
///
/// # Errors
///
/// Returns [`DataLinkError::RequestTooLarge`] (`413`) for oversized requests.
pub async fn limit_request_length(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, DataLinkError> {
    let limit = u64::try_from(state.context.settings().max_request_length).unwrap_or(u64::MAX);
    let length = request_length(&request);
    if length > limit {
        debug!(length, limit, path = %request.uri().path(), "request too large");
        return Err(DataLinkError::RequestTooLarge { length, limit });
    }
    Ok(next.run(request).await)
}

/// Record plain HTTP traffic on the context's HTTP rate tracker.
pub async fn account_rates(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let rates = state.context.http_rates();
    rates.record_up(request_length(&request));

    let response = next.run(request).await;
    let hint = response.body().size_hint();
    let body = hint.exact().unwrap_or_else(|| hint.lower());
    rates.record_down(
        STATUS_LINE_OVERHEAD
            .saturating_add(headers_len(response.headers()))
            .saturating_add(body),
    );
    response
}

/// Estimated size of the request head plus its declared body.
fn request_length(request: &Request) -> u64 {
    let target = request
        .uri()
        .path_and_query()
        .map_or(1, |pq| pq.as_str().len());
    let method = request.method().as_str().len();

    let line = wire_len(method)
        .saturating_add(1)
        .saturating_add(wire_len(target))
        .saturating_add(REQUEST_LINE_OVERHEAD);
    line.saturating_add(headers_len(request.headers()))
        .saturating_add(content_length(request.headers()))
}

fn headers_len(headers: &HeaderMap) -> u64 {
    headers.iter().fold(0, |total, (name, value)| {
        total
            .saturating_add(wire_len(name.as_str().len()))
            .saturating_add(wire_len(value.len()))
            .saturating_add(HEADER_OVERHEAD)
    })
}

fn content_length(headers: &HeaderMap) -> u64 {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0)
}

fn wire_len(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http;

    use super::*;

    #[test]
    fn request_length_counts_head_and_declared_body() {
        let request = http::Request::get("/datalink?a=b")
            .header(header::HOST, "x")
            .body(Body::empty())
            .unwrap();
        // "GET /datalink?a=b HTTP/1.1\r\n" + "host: x\r\n" + "\r\n"
        assert_eq!(request_length(&request), 28 + 9 + 2);

        let request = http::Request::post("/")
            .header(header::CONTENT_LENGTH, "500")
            .body(Body::empty())
            .unwrap();
        // "POST / HTTP/1.1\r\n" + "content-length: 500\r\n" + "\r\n" + body
        assert_eq!(request_length(&request), 17 + 21 + 2 + 500);
    }

    #[test]
    fn unparsable_content_length_counts_as_zero() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, "lots".parse().unwrap());
        assert_eq!(content_length(&headers), 0);
    }
}
