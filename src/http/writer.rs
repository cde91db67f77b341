//! Response writer module
//!
//! A blocking, incremental response sink: headers are mutable until the head
//! is written, then body bytes follow. File serving runs against this trait so
//! the same code can fill an in-memory response or stream to a live connection.

use hyper::header::{
    HeaderValue, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED, LOCATION,
};
use hyper::{HeaderMap, StatusCode};
use std::io;

pub trait ResponseWriter {
    fn headers(&self) -> &HeaderMap;

    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Send the status line and current headers; later calls are ignored
    fn write_header(&mut self, status: StatusCode);

    /// Write body bytes, sending a `200 OK` head first if none was written
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Status already sent, if any
    fn status(&self) -> Option<StatusCode>;
}

/// Reply with a short plain-text error, like a bare static server would
pub fn error<W: ResponseWriter + ?Sized>(w: &mut W, status: StatusCode, message: &str) {
    let headers = w.headers_mut();
    for name in [CONTENT_LENGTH, CONTENT_ENCODING, ETAG, LAST_MODIFIED] {
        headers.remove(name);
    }
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    w.write_header(status);
    // The client may already be gone; nothing left to report to.
    let _ = w.write(format!("{message}\n").as_bytes());
}

/// Decorator turning a `200` into `301` when a redirect was scheduled
///
/// Lets a redirect carry the payload for clients that do not follow
/// `Location` (curl, wget) while browsers still redirect.
pub struct StatusResponseWriter<'w, W: ResponseWriter + ?Sized> {
    inner: &'w mut W,
}

impl<'w, W: ResponseWriter + ?Sized> StatusResponseWriter<'w, W> {
    pub fn new(inner: &'w mut W) -> Self {
        Self { inner }
    }
}

impl<W: ResponseWriter + ?Sized> ResponseWriter for StatusResponseWriter<'_, W> {
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        let status = if status == StatusCode::OK && self.inner.headers().contains_key(LOCATION) {
            StatusCode::MOVED_PERMANENTLY
        } else {
            status
        };
        self.inner.write_header(status);
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        if self.inner.status().is_none() {
            self.write_header(StatusCode::OK);
        }
        self.inner.write(data)
    }

    fn status(&self) -> Option<StatusCode> {
        self.inner.status()
    }
}

/// Collects a whole response in memory
#[derive(Debug, Default)]
pub struct BufferedWriter {
    headers: HeaderMap,
    head: Option<(StatusCode, HeaderMap)>,
    body: Vec<u8>,
}

impl BufferedWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Headers as they were when the head was written
    pub fn sent_headers(&self) -> Option<&HeaderMap> {
        self.head.as_ref().map(|(_, headers)| headers)
    }
}

impl ResponseWriter for BufferedWriter {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.head.is_none() {
            self.head = Some((status, self.headers.clone()));
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.write_header(StatusCode::OK);
        self.body.extend_from_slice(data);
        Ok(())
    }

    fn status(&self) -> Option<StatusCode> {
        self.head.as_ref().map(|(status, _)| *status)
    }
}
