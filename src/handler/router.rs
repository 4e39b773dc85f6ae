//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, mount-prefix
//! stripping, route matching, dispatch, and the access log line.

use crate::config::AppState;
use crate::handler::{pages, proxy, static_files};
use crate::http;
use crate::logger::{self, AccessLogEntry};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{header, Method, Request, Response};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

/// Website pages, each rendered from one template file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Index,
    EmbudMap,
    Team,
}

impl Page {
    pub const fn template(self) -> &'static str {
        match self {
            Self::Index => "index.html",
            Self::EmbudMap => "embud-map.html",
            Self::Team => "team.html",
        }
    }
}

/// Result of matching a path against the routing table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Page(Page),
    CreekData,
    /// Static asset, path relative to the static directory
    Static(&'a str),
    NotFound,
}

/// Request context encapsulating information needed for request processing
pub struct RequestContext<'a> {
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub is_head: bool,
    pub if_none_match: Option<&'a str>,
}

/// The routing table
///
/// | Path               | Handler      |
/// |--------------------|--------------|
/// | `/`                | index        |
/// | `/embud-map/`      | embud map    |
/// | `/team/`           | team         |
/// | `/api/creek-data/` | creek proxy  |
/// | `/static/*`        | static files |
///
/// Trailing slashes are optional. When `base_path` is set, only paths under
/// it are served and the prefix is removed before matching.
pub fn resolve<'a>(path: &'a str, base_path: &str) -> Route<'a> {
    let path = if base_path.is_empty() {
        path
    } else {
        match path.strip_prefix(base_path) {
            Some("") => "/",
            Some(rest) if rest.starts_with('/') => rest,
            _ => return Route::NotFound,
        }
    };

    if let Some(asset) = path.strip_prefix("/static/") {
        return Route::Static(asset);
    }

    match path.trim_end_matches('/') {
        "" => Route::Page(Page::Index),
        "/embud-map" => Route::Page(Page::EmbudMap),
        "/team" => Route::Page(Page::Team),
        "/api/creek-data" => Route::CreekData,
        _ => Route::NotFound,
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    remote_addr: Arc<str>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let (parts, _) = req.into_parts();

    let response = dispatch(&parts, &state).await;

    if state.config.logging.access_log {
        let entry = build_access_entry(&parts, &response, &remote_addr, started);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

async fn dispatch(parts: &hyper::http::request::Parts, state: &AppState) -> Response<Full<Bytes>> {
    // 1. Check HTTP method
    if let Some(resp) = check_http_method(&parts.method, state.config.http.enable_cors) {
        return resp;
    }

    // 2. Check body size
    if let Some(resp) = check_body_size(&parts.headers, state.config.http.max_body_size) {
        return resp;
    }

    let ctx = RequestContext {
        path: parts.uri.path(),
        query: parts.uri.query(),
        is_head: parts.method == Method::HEAD,
        if_none_match: parts
            .headers
            .get(header::IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok()),
    };

    // 3. Match and dispatch
    match resolve(ctx.path, state.config.base_path()) {
        Route::Page(page) => pages::render(&ctx, page, &state.config.site.template_dir).await,
        Route::CreekData => proxy::creek_data_proxy(ctx.query, state).await,
        Route::Static(asset) => {
            static_files::serve_static(&ctx, &state.config.site.static_dir, asset).await
        }
        Route::NotFound => http::build_404_response(),
    }
}

/// Check HTTP method and return appropriate response for non-GET/HEAD methods
fn check_http_method(method: &Method, enable_cors: bool) -> Option<Response<Full<Bytes>>> {
    match *method {
        Method::GET | Method::HEAD => None,
        Method::OPTIONS => Some(http::build_options_response(enable_cors)),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(http::build_405_response())
        }
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size(
    headers: &hyper::HeaderMap,
    max_body_size: u64,
) -> Option<Response<Full<Bytes>>> {
    let size_str = headers.get(header::CONTENT_LENGTH)?.to_str().ok()?;
    match size_str.parse::<u64>() {
        Ok(size) if size > max_body_size => {
            logger::log_warning(&format!(
                "Request body too large: {size} bytes (max: {max_body_size})"
            ));
            Some(http::build_413_response())
        }
        Ok(_) => None,
        Err(_) => {
            logger::log_warning(&format!(
                "Invalid Content-Length value: '{size_str}', skipping size check"
            ));
            None
        }
    }
}

fn build_access_entry(
    parts: &hyper::http::request::Parts,
    response: &Response<Full<Bytes>>,
    remote_addr: &str,
    started: Instant,
) -> AccessLogEntry {
    let header_value = |name: header::HeaderName| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        remote_addr.to_string(),
        parts.method.to_string(),
        parts.uri.path().to_string(),
    );
    entry.query = parts.uri.query().map(ToString::to_string);
    entry.http_version = format!("{:?}", parts.version)
        .trim_start_matches("HTTP/")
        .to_string();
    entry.status = response.status().as_u16();
    entry.body_bytes = response
        .body()
        .size_hint()
        .exact()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0);
    entry.referer = header_value(header::REFERER);
    entry.user_agent = header_value(header::USER_AGENT);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    entry
}
