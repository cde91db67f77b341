//! Single file request orchestration
//!
//! Runs the fixed sequence for one resolved file: cache headers, disposition,
//! size, seekable adapter, explicit Content-Type, status fixup, conditional
//! and range responder, then a latency observation when bytes went out.

use crate::content::{ContentDescriptor, ContentSource, LazySeeker};
use crate::error::ServeError;
use crate::http::cache::{add_cache_control_headers, CachePolicy};
use crate::http::disposition::add_content_disposition_header;
use crate::http::mime::resolve_content_type;
use crate::http::serve::{serve_content, ResponseOutcome};
use crate::http::writer::{error, ResponseWriter, StatusResponseWriter};
use crate::metrics::MetricsSink;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::http::request::Parts;
use std::time::{Instant, SystemTime};
use tracing::{debug, info_span, warn};

/// Identity of the file being served, as resolved from the request path
#[derive(Debug, Clone)]
pub struct FileRequest<'a> {
    /// Logical content path; span attribute and fallback display name
    pub content_path: &'a str,
    /// Metric label
    pub namespace: &'a str,
    pub content_id: String,
    pub modified: Option<SystemTime>,
    pub policy: CachePolicy,
    /// When the request arrived
    pub started: Instant,
}

/// Serve one file through `w`
///
/// Errors before the responder runs are answered here (502 for an unknown
/// size, 500 for content-type failures) and never produce a metric.
pub fn serve_file<W, S>(
    w: &mut W,
    req: &Parts,
    file: &FileRequest<'_>,
    source: S,
    metrics: &dyn MetricsSink,
) -> ResponseOutcome
where
    W: ResponseWriter + ?Sized,
    S: ContentSource,
{
    let span = info_span!("serve_file", path = file.content_path);
    let _enter = span.enter();

    let modified =
        add_cache_control_headers(w.headers_mut(), &file.content_id, file.modified, file.policy);
    let name = add_content_disposition_header(w.headers_mut(), req.uri.query(), file.content_path);

    let size = match source.size() {
        Ok(size) => size,
        Err(e) => return fail(w, &ServeError::UnknownSize(e)),
    };

    let kind = source.kind();
    let mut content = LazySeeker::new(source, size);
    let mime_type = match resolve_content_type(&name, kind, &mut content) {
        Ok(ctype) => ctype,
        Err(e) => return fail(w, &e),
    };

    let descriptor = ContentDescriptor {
        name,
        size,
        mime_type,
        modified,
    };
    match HeaderValue::from_str(&descriptor.mime_type) {
        Ok(value) => {
            w.headers_mut().insert(CONTENT_TYPE, value);
        }
        Err(_) => warn!(mime = %descriptor.mime_type, "unusable content type"),
    }

    let mut writer = StatusResponseWriter::new(w);
    let outcome = serve_content(
        &mut writer,
        req,
        &descriptor.name,
        descriptor.modified,
        &mut content,
    );

    if outcome.bytes_transmitted {
        metrics.observe(file.namespace, file.started.elapsed().as_secs_f64());
    }
    debug!(
        status = outcome.status.as_u16(),
        size = descriptor.size,
        mime = %descriptor.mime_type,
        restarts = content.restarts(),
        bytes_transmitted = outcome.bytes_transmitted,
        "file served"
    );
    outcome
}

fn fail<W: ResponseWriter + ?Sized>(w: &mut W, err: &ServeError) -> ResponseOutcome {
    let status = err.status();
    warn!(%status, error = %err, "file request failed");
    error(w, status, &err.to_string());
    ResponseOutcome {
        status,
        bytes_transmitted: false,
    }
}
