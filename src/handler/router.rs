//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, the metrics
//! endpoint, path resolution, and the hand-off of file serving to a blocking
//! worker whose output streams back through a channel body.

use crate::config::AppState;
use crate::handler::file::{serve_file, FileRequest};
use crate::handler::resolve::{resolve, ResolvedFile};
use crate::http::{self, ResponseWriter};
use crate::logger::{self, AccessLogEntry};
use crate::server::body::{self, ResponseBody};
use http_body_util::BodyExt;
use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH, RANGE, REFERER, SERVER, USER_AGENT};
use hyper::http::request::Parts;
use hyper::{Method, Request, Response, StatusCode, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Main entry point for HTTP request handling
///
/// The request body is never read; only GET and HEAD are served.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer: SocketAddr,
) -> Result<Response<ResponseBody>, Infallible> {
    let started = Instant::now();
    let entry = state
        .config
        .logging
        .access_log
        .then(|| access_entry(&req, peer));

    let response = route_request(req, &state, started).await;

    if let Some(mut entry) = entry {
        entry.status = response.status().as_u16();
        entry.body_bytes = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }
    Ok(response)
}

fn access_entry<B>(req: &Request<B>, peer: SocketAddr) -> AccessLogEntry {
    let header = |name: HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };
    let mut entry = AccessLogEntry::new(peer.ip().to_string(), req.method().as_str(), req.uri().path());
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = match req.version() {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
    .to_string();
    entry.range = header(RANGE);
    entry.referer = header(REFERER);
    entry.user_agent = header(USER_AGENT);
    entry
}

/// Check HTTP method and return a 405 for anything but GET/HEAD
fn check_http_method(method: &Method) -> Option<Response<ResponseBody>> {
    match *method {
        Method::GET | Method::HEAD => None,
        _ => {
            warn!(%method, "method not allowed");
            Some(http::build_405_response().map(BodyExt::boxed))
        }
    }
}

async fn route_request<B>(
    req: Request<B>,
    state: &Arc<AppState>,
    started: Instant,
) -> Response<ResponseBody> {
    if let Some(resp) = check_http_method(req.method()) {
        return resp;
    }

    let path = req.uri().path().to_string();
    let metrics = &state.config.metrics;
    if metrics.enabled && path == metrics.path {
        return metrics_response(state, req.method() == Method::HEAD);
    }

    let file = match resolve(&state.mounts, &path) {
        Ok(file) => file,
        Err(e) => {
            debug!(%path, reason = %e, "path not served");
            return http::build_404_response().map(BodyExt::boxed);
        }
    };

    let (parts, _body) = req.into_parts();
    spawn_file_worker(parts, file, path, state, started).await
}

fn metrics_response(state: &AppState, is_head: bool) -> Response<ResponseBody> {
    match state.histogram.to_json() {
        Ok(json) => http::build_json_response(json, is_head).map(BodyExt::boxed),
        Err(e) => {
            error!(error = %e, "cannot encode metrics");
            http::response::build_text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "500 Internal Server Error",
            )
            .map(BodyExt::boxed)
        }
    }
}

/// Serve `file` on the blocking pool and stream its output
async fn spawn_file_worker(
    parts: Parts,
    file: ResolvedFile,
    path: String,
    state: &Arc<AppState>,
    started: Instant,
) -> Response<ResponseBody> {
    let (mut writer, head_rx, body) = body::channel(state.config.http.stream_buffer);
    let metrics = state.metrics_sink();
    let server_name = HeaderValue::from_str(&state.config.http.server_name).ok();
    let span = tracing::Span::current();

    tokio::task::spawn_blocking(move || {
        let _enter = span.enter();
        if let Some(name) = server_name {
            writer.headers_mut().insert(SERVER, name);
        }
        let request = FileRequest {
            content_path: &path,
            namespace: &file.namespace,
            content_id: file.content_id,
            modified: file.modified,
            policy: file.policy,
            started,
        };
        serve_file(&mut writer, &parts, &request, file.source, metrics.as_ref());
    });

    match head_rx.await {
        Ok((status, headers)) => {
            let mut response = Response::new(body.boxed());
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            response
        }
        Err(_) => {
            error!("file worker ended without a response");
            http::response::build_503_response().map(BodyExt::boxed)
        }
    }
}
