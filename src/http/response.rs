//! HTTP response building module
//!
//! Builders for the status codes the voting server emits.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{self, HeaderName, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::metrics;

/// Build a response with a body, dropping the body for HEAD but keeping its length
fn build_body_response(
    status: StatusCode,
    content_type: &str,
    body: Bytes,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let content_length = body.len();
    let body = if is_head { Bytes::new() } else { body };

    Response::builder()
        .status(status)
        .header("Content-Type", content_type)
        .header("Content-Length", content_length)
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build generic HTML response
pub fn build_html_response(content: String, is_head: bool) -> Response<Full<Bytes>> {
    build_body_response(
        StatusCode::OK,
        "text/html; charset=utf-8",
        Bytes::from(content),
        is_head,
    )
}

/// Build JSON response
pub fn build_json_response<T: Serialize>(
    status: StatusCode,
    body: &T,
    is_head: bool,
) -> Response<Full<Bytes>> {
    match serde_json::to_vec(body) {
        Ok(json) => build_body_response(status, "application/json", Bytes::from(json), is_head),
        Err(e) => {
            crate::logger::log_error(&format!("Failed to serialize response: {e}"));
            build_body_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "application/json",
                Bytes::from_static(br#"{"error":"Internal server error"}"#),
                is_head,
            )
        }
    }
}

/// Build `{"error": message}` JSON response
pub fn build_error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    build_json_response(status, &serde_json::json!({ "error": message }), false)
}

/// Build Prometheus exposition response
pub fn build_metrics_response(text: String, is_head: bool) -> Response<Full<Bytes>> {
    build_body_response(
        StatusCode::OK,
        metrics::CONTENT_TYPE,
        Bytes::from(text),
        is_head,
    )
}

/// Build health probe response
pub fn build_health_response(status: &str, is_head: bool) -> Response<Full<Bytes>> {
    build_json_response(
        StatusCode::OK,
        &serde_json::json!({ "status": status }),
        is_head,
    )
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<Full<Bytes>> {
    build_body_response(
        StatusCode::NOT_FOUND,
        "text/plain",
        Bytes::from_static(b"404 Not Found"),
        false,
    )
}

/// Build 405 Method Not Allowed response
pub fn build_405_response(allow: &str) -> Response<Full<Bytes>> {
    let mut resp = build_body_response(
        StatusCode::METHOD_NOT_ALLOWED,
        "text/plain",
        Bytes::from_static(b"405 Method Not Allowed"),
        false,
    );
    insert_header(&mut resp, header::ALLOW, allow);
    resp
}

/// Build 413 Payload Too Large response
pub fn build_413_response() -> Response<Full<Bytes>> {
    build_body_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        "text/plain",
        Bytes::from_static(b"413 Payload Too Large"),
        false,
    )
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(allow: &str, enable_cors: bool) -> Response<Full<Bytes>> {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Allow", allow);

    if enable_cors {
        builder = builder
            .header("Access-Control-Allow-Methods", allow)
            .header("Access-Control-Allow-Headers", "Content-Type")
            .header("Access-Control-Max-Age", "86400");
    }

    builder.body(Full::new(Bytes::new())).unwrap_or_else(|e| {
        log_build_error("OPTIONS", &e);
        Response::new(Full::new(Bytes::new()))
    })
}

/// Set a header, skipping values that are not valid header text
pub fn insert_header(resp: &mut Response<Full<Bytes>>, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            resp.headers_mut().insert(name, v);
        }
        Err(e) => crate::logger::log_error(&format!("Invalid {name} header value: {e}")),
    }
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
