//! Conditional and range content serving module
//!
//! Serves a seekable body for GET and HEAD: preconditions (304/412), single
//! and multipart byte ranges (206/416) and plain full responses (200). The
//! body is read strictly through `Seek` + bounded `Read`, so any reader that
//! honours that contract works regardless of the range pattern requested.

use crate::content::EntryKind;
use crate::http::conditional::{evaluate, unix_secs, Precondition, Validators};
use crate::http::mime::resolve_content_type;
use crate::http::range::{parse_range_header, total_length, ByteRange, RangeParseResult};
use crate::http::writer::{error, ResponseWriter};
use httpdate::fmt_http_date;
use hyper::header::{
    HeaderValue, ACCEPT_RANGES, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE,
    ETAG, LAST_MODIFIED,
};
use hyper::http::request::Parts;
use hyper::{Method, StatusCode};
use std::io::{self, Read, Seek, SeekFrom};
use std::time::SystemTime;
use tracing::debug;

/// Size of each body chunk handed to the writer
const COPY_CHUNK: usize = 32 * 1024;

/// What a served request amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseOutcome {
    pub status: StatusCode,
    /// At least one body byte reached the writer
    pub bytes_transmitted: bool,
}

/// How the body is laid out once headers are decided
enum BodyPlan {
    /// `length` bytes from the current position
    Contiguous { length: u64 },
    Multipart(Multipart),
}

/// Precomputed `multipart/byteranges` framing
struct Multipart {
    parts: Vec<(String, ByteRange)>,
    closing: String,
}

impl Multipart {
    fn new(boundary: &str, ctype: &str, ranges: Vec<ByteRange>, size: u64) -> Self {
        let parts = ranges
            .into_iter()
            .enumerate()
            .map(|(i, range)| {
                let lead = if i == 0 { "" } else { "\r\n" };
                let header = format!(
                    "{lead}--{boundary}\r\nContent-Range: {}\r\nContent-Type: {ctype}\r\n\r\n",
                    range.content_range(size)
                );
                (header, range)
            })
            .collect();
        Self {
            parts,
            closing: format!("\r\n--{boundary}--\r\n"),
        }
    }

    fn encoded_len(&self) -> u64 {
        let framing: usize = self.parts.iter().map(|(h, _)| h.len()).sum::<usize>() + self.closing.len();
        framing as u64 + self.parts.iter().map(|(_, r)| r.length).sum::<u64>()
    }
}

fn new_boundary() -> String {
    format!("{:016x}{:016x}", rand::random::<u64>(), rand::random::<u64>())
}

fn set_header<W: ResponseWriter + ?Sized>(w: &mut W, name: hyper::header::HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        w.headers_mut().insert(name, value);
    }
}

fn outcome<W: ResponseWriter + ?Sized>(w: &W, bytes_transmitted: bool) -> ResponseOutcome {
    ResponseOutcome {
        status: w.status().unwrap_or(StatusCode::OK),
        bytes_transmitted,
    }
}

fn write_not_modified<W: ResponseWriter + ?Sized>(w: &mut W) {
    let headers = w.headers_mut();
    headers.remove(CONTENT_TYPE);
    headers.remove(CONTENT_LENGTH);
    headers.remove(CONTENT_ENCODING);
    if headers.contains_key(ETAG) {
        headers.remove(LAST_MODIFIED);
    }
    w.write_header(StatusCode::NOT_MODIFIED);
}

/// Serve `content` with conditional and range semantics
///
/// `name` is only used to pick a Content-Type when the caller has not set
/// one. `modified`, when present, drives `Last-Modified` and date-based
/// preconditions; an `ETag` already set on `w` drives tag-based ones.
pub fn serve_content<W, R>(
    w: &mut W,
    req: &Parts,
    name: &str,
    modified: Option<SystemTime>,
    content: &mut R,
) -> ResponseOutcome
where
    W: ResponseWriter + ?Sized,
    R: Read + Seek,
{
    if let (Some(_), Some(time)) = (unix_secs(modified), modified) {
        set_header(w, LAST_MODIFIED, &fmt_http_date(time));
    }

    let etag = w
        .headers()
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    let validators = Validators {
        etag: etag.as_deref(),
        modified,
    };

    let range_header = match evaluate(&req.method, &req.headers, &validators) {
        Precondition::NotModified => {
            write_not_modified(w);
            return outcome(w, false);
        }
        Precondition::Failed => {
            w.write_header(StatusCode::PRECONDITION_FAILED);
            return outcome(w, false);
        }
        Precondition::Proceed { range } => range,
    };

    if !w.headers().contains_key(CONTENT_TYPE) {
        match resolve_content_type(name, EntryKind::Regular, content) {
            Ok(ctype) => set_header(w, CONTENT_TYPE, &ctype),
            Err(e) => {
                error(w, StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
                return outcome(w, false);
            }
        }
    }

    let size = match content_size(content) {
        Ok(size) => size,
        Err(e) => {
            error(w, StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
            return outcome(w, false);
        }
    };

    let mut status = StatusCode::OK;
    let mut plan = BodyPlan::Contiguous { length: size };

    match parse_range_header(range_header.as_deref(), size) {
        RangeParseResult::None => {}
        RangeParseResult::Invalid => {
            error(w, StatusCode::RANGE_NOT_SATISFIABLE, "invalid range");
            return outcome(w, false);
        }
        RangeParseResult::NotSatisfiable => {
            set_header(w, CONTENT_RANGE, &format!("bytes */{size}"));
            error(
                w,
                StatusCode::RANGE_NOT_SATISFIABLE,
                "invalid range: failed to overlap",
            );
            return outcome(w, false);
        }
        // More bytes requested than exist; likely abusive, serve it whole.
        RangeParseResult::Valid(ranges) if total_length(&ranges) > size => {}
        RangeParseResult::Valid(mut ranges) if ranges.len() == 1 => {
            let range = ranges.remove(0);
            if let Err(e) = content.seek(SeekFrom::Start(range.start)) {
                error(w, StatusCode::RANGE_NOT_SATISFIABLE, &e.to_string());
                return outcome(w, false);
            }
            set_header(w, CONTENT_RANGE, &range.content_range(size));
            status = StatusCode::PARTIAL_CONTENT;
            plan = BodyPlan::Contiguous {
                length: range.length,
            };
        }
        RangeParseResult::Valid(ranges) => {
            let boundary = new_boundary();
            let ctype = w
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let multipart = Multipart::new(&boundary, &ctype, ranges, size);
            set_header(
                w,
                CONTENT_TYPE,
                &format!("multipart/byteranges; boundary={boundary}"),
            );
            status = StatusCode::PARTIAL_CONTENT;
            plan = BodyPlan::Multipart(multipart);
        }
    }

    let send_size = match &plan {
        BodyPlan::Contiguous { length } => *length,
        BodyPlan::Multipart(multipart) => multipart.encoded_len(),
    };

    set_header(w, ACCEPT_RANGES, "bytes");
    if !w.headers().contains_key(CONTENT_ENCODING) {
        set_header(w, CONTENT_LENGTH, &send_size.to_string());
    }
    w.write_header(status);

    if req.method == Method::HEAD {
        return outcome(w, false);
    }

    let mut written = 0u64;
    let result = match &plan {
        BodyPlan::Contiguous { length } => copy_exact(content, w, *length, &mut written),
        BodyPlan::Multipart(multipart) => write_multipart(content, w, multipart, &mut written),
    };
    if let Err(e) = result {
        debug!(error = %e, written, expected = send_size, "response body aborted");
    }

    outcome(w, written > 0)
}

/// Learn the size by seeking to the end, then rewind
fn content_size<R: Seek>(content: &mut R) -> io::Result<u64> {
    let size = content.seek(SeekFrom::End(0))?;
    content.seek(SeekFrom::Start(0))?;
    Ok(size)
}

fn copy_exact<R, W>(content: &mut R, w: &mut W, length: u64, written: &mut u64) -> io::Result<()>
where
    R: Read,
    W: ResponseWriter + ?Sized,
{
    let mut buf = vec![0u8; COPY_CHUNK];
    let mut remaining = length;
    while remaining > 0 {
        let want = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
        let n = content.read(&mut buf[..want])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "content ended before the requested length",
            ));
        }
        w.write(&buf[..n])?;
        *written += n as u64;
        remaining -= n as u64;
    }
    Ok(())
}

fn write_multipart<R, W>(
    content: &mut R,
    w: &mut W,
    multipart: &Multipart,
    written: &mut u64,
) -> io::Result<()>
where
    R: Read + Seek,
    W: ResponseWriter + ?Sized,
{
    for (header, range) in &multipart.parts {
        w.write(header.as_bytes())?;
        *written += header.len() as u64;
        content.seek(SeekFrom::Start(range.start))?;
        copy_exact(content, w, range.length, written)?;
    }
    w.write(multipart.closing.as_bytes())?;
    *written += multipart.closing.len() as u64;
    Ok(())
}
