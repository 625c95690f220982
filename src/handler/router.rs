//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: route lookup, method
//! validation, body size checks, dispatch, metrics and access logging.

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{self, HeaderMap};
use hyper::{Method, Request, Response, StatusCode, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{AppState, HealthConfig};
use crate::handler::{pages, vote};
use crate::http;
use crate::logger::{self, AccessLogEntry};

const READ_METHODS: &str = "GET, HEAD, OPTIONS";
const WRITE_METHODS: &str = "POST, OPTIONS";

/// Known routes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Vote,
    Result,
    Metrics,
    Liveness,
    Readiness,
}

impl Route {
    /// Exact-path lookup
    pub fn resolve(path: &str, health: &HealthConfig) -> Option<Self> {
        match path {
            "/" => Some(Self::Home),
            "/vote" => Some(Self::Vote),
            "/result" => Some(Self::Result),
            "/metrics" => Some(Self::Metrics),
            p if health.enabled && p == health.liveness_path => Some(Self::Liveness),
            p if health.enabled && p == health.readiness_path => Some(Self::Readiness),
            _ => None,
        }
    }

    /// Value of the `Allow` header
    pub const fn allow(self) -> &'static str {
        match self {
            Self::Vote => WRITE_METHODS,
            _ => READ_METHODS,
        }
    }

    fn permits(self, method: &Method) -> bool {
        match self {
            Self::Vote => method == Method::POST,
            _ => method == Method::GET || method == Method::HEAD,
        }
    }

    /// Endpoint label for request metrics; untracked routes return `None`
    pub const fn metrics_endpoint(self) -> Option<&'static str> {
        match self {
            Self::Home => Some("/"),
            Self::Vote => Some("/vote"),
            Self::Result => Some("/result"),
            Self::Metrics | Self::Liveness | Self::Readiness => None,
        }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: Option<SocketAddr>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let start = Instant::now();
    let (parts, body) = req.into_parts();

    let mut response = match Route::resolve(parts.uri.path(), &state.config.health) {
        None => http::build_404_response(),
        Some(route) => route_request(route, &parts.method, &parts.headers, body, &state).await,
    };

    finalize_headers(&mut response, &state);

    if state.cached_access_log.load(Ordering::Relaxed) {
        let mut entry = AccessLogEntry::new(parts.method.as_str(), parts.uri.path());
        entry.remote_addr = peer_addr;
        entry.query = parts.uri.query().map(ToString::to_string);
        entry.http_version = version_label(parts.version).to_string();
        entry.status = response.status().as_u16();
        entry.body_bytes = usize::try_from(response.body().size_hint().exact().unwrap_or(0))
            .unwrap_or(usize::MAX);
        entry.referer = header_string(&parts.headers, &header::REFERER);
        entry.user_agent = header_string(&parts.headers, &header::USER_AGENT);
        entry.request_time = start.elapsed();
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Method checks, body size check, then dispatch to the route handler
async fn route_request<B>(
    route: Route,
    method: &Method,
    headers: &HeaderMap,
    body: B,
    state: &Arc<AppState>,
) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if method == Method::OPTIONS {
        return http::build_options_response(route.allow(), state.config.http.enable_cors);
    }

    if !route.permits(method) {
        logger::log_warning(&format!("Method not allowed: {method}"));
        return http::build_405_response(route.allow());
    }

    if let Some(resp) = check_body_size(headers, state.config.http.max_body_size) {
        return resp;
    }

    let start = Instant::now();
    let is_head = method == Method::HEAD;

    let response = match route {
        Route::Home => pages::serve_home(state, is_head),
        Route::Vote => vote::handle_vote(headers, body, state).await,
        Route::Result => pages::serve_result(state, is_head),
        Route::Metrics => http::build_metrics_response(state.metrics.render(), is_head),
        Route::Liveness | Route::Readiness => http::build_health_response("ok", is_head),
    };

    // Oversized bodies are not counted, whether declared or streamed
    let tracked = route
        .metrics_endpoint()
        .filter(|_| response.status() != StatusCode::PAYLOAD_TOO_LARGE);
    if let Some(endpoint) = tracked {
        state
            .metrics
            .track(endpoint, method.as_str(), start.elapsed());
    }

    response
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size(headers: &HeaderMap, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = headers.get(header::CONTENT_LENGTH)?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_warning(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

/// Headers every response carries
fn finalize_headers(response: &mut Response<Full<Bytes>>, state: &AppState) {
    http::insert_header(response, header::SERVER, &state.config.http.server_name);
    if state.config.http.enable_cors {
        http::insert_header(response, header::ACCESS_CONTROL_ALLOW_ORIGIN, "*");
    }
}

fn header_string(headers: &HeaderMap, name: &header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

fn version_label(version: Version) -> &'static str {
    if version == Version::HTTP_10 {
        "1.0"
    } else if version == Version::HTTP_2 {
        "2"
    } else {
        "1.1"
    }
}
