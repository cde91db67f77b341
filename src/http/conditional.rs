//! Conditional request evaluation module
//!
//! Evaluates `If-Match`, `If-Unmodified-Since`, `If-None-Match`,
//! `If-Modified-Since` and `If-Range` against the current validators
//! (RFC 7232 section 6 ordering).

use httpdate::parse_http_date;
use hyper::header::{IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE, IF_UNMODIFIED_SINCE, RANGE};
use hyper::{HeaderMap, Method};
use std::time::SystemTime;

/// Result of a single precondition header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cond {
    /// Header absent or not applicable
    None,
    True,
    False,
}

/// What the responder should do after evaluating preconditions
#[derive(Debug, PartialEq, Eq)]
pub enum Precondition {
    /// Serve the content, honoring `range` if still present
    Proceed { range: Option<String> },
    /// 304
    NotModified,
    /// 412
    Failed,
}

/// Validators that describe the current representation
#[derive(Debug, Clone, Copy, Default)]
pub struct Validators<'a> {
    pub etag: Option<&'a str>,
    pub modified: Option<SystemTime>,
}

fn header<'h>(headers: &'h HeaderMap, name: hyper::header::HeaderName) -> Option<&'h str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Whole seconds since the epoch; the epoch itself counts as "no time"
pub(crate) fn unix_secs(time: Option<SystemTime>) -> Option<u64> {
    time.and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .filter(|secs| *secs > 0)
}

fn parse_secs(value: &str) -> Option<u64> {
    unix_secs(parse_http_date(value).ok())
}

fn opaque(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag)
}

fn is_weak(tag: &str) -> bool {
    tag.starts_with("W/")
}

/// Strong comparison: neither tag may be weak
pub fn etag_strong_match(a: &str, b: &str) -> bool {
    !is_weak(a) && !is_weak(b) && a == b && a.starts_with('"')
}

/// Weak comparison: `W/` prefixes are ignored
pub fn etag_weak_match(a: &str, b: &str) -> bool {
    opaque(a) == opaque(b)
}

/// Check a comma-separated entity-tag list (or `*`) against `etag`
fn list_matches(list: &str, etag: Option<&str>, strong: bool) -> bool {
    list.split(',').map(str::trim).any(|candidate| {
        if candidate == "*" {
            return true;
        }
        etag.is_some_and(|etag| {
            if strong {
                etag_strong_match(candidate, etag)
            } else {
                etag_weak_match(candidate, etag)
            }
        })
    })
}

fn check_if_match(req: &HeaderMap, v: &Validators<'_>) -> Cond {
    match header(req, IF_MATCH) {
        None => Cond::None,
        Some(list) if list_matches(list, v.etag, true) => Cond::True,
        Some(_) => Cond::False,
    }
}

fn check_if_unmodified_since(req: &HeaderMap, v: &Validators<'_>) -> Cond {
    let (Some(value), Some(modified)) = (header(req, IF_UNMODIFIED_SINCE), unix_secs(v.modified))
    else {
        return Cond::None;
    };
    match parse_secs(value) {
        Some(since) if modified <= since => Cond::True,
        Some(_) => Cond::False,
        None => Cond::None,
    }
}

fn check_if_none_match(req: &HeaderMap, v: &Validators<'_>) -> Cond {
    match header(req, IF_NONE_MATCH) {
        None => Cond::None,
        Some(list) if list_matches(list, v.etag, false) => Cond::False,
        Some(_) => Cond::True,
    }
}

fn check_if_modified_since(method: &Method, req: &HeaderMap, v: &Validators<'_>) -> Cond {
    if method != Method::GET && method != Method::HEAD {
        return Cond::None;
    }
    let (Some(value), Some(modified)) = (header(req, IF_MODIFIED_SINCE), unix_secs(v.modified))
    else {
        return Cond::None;
    };
    match parse_secs(value) {
        // HTTP dates have one-second resolution
        Some(since) if modified <= since => Cond::False,
        Some(_) => Cond::True,
        None => Cond::None,
    }
}

fn check_if_range(method: &Method, req: &HeaderMap, v: &Validators<'_>) -> Cond {
    if method != Method::GET && method != Method::HEAD {
        return Cond::None;
    }
    let Some(value) = header(req, IF_RANGE) else {
        return Cond::None;
    };

    if value.starts_with('"') || is_weak(value) {
        return if v.etag.is_some_and(|etag| etag_strong_match(value, etag)) {
            Cond::True
        } else {
            Cond::False
        };
    }

    match (unix_secs(v.modified), parse_secs(value)) {
        (Some(modified), Some(at)) if modified == at => Cond::True,
        _ => Cond::False,
    }
}

/// Evaluate all preconditions of a request
///
/// # Examples
/// ```
/// use hyper::{HeaderMap, Method};
/// use rangegate::http::conditional::{evaluate, Precondition, Validators};
///
/// let mut req = HeaderMap::new();
/// req.insert("if-none-match", "\"abc\"".parse().unwrap());
/// let validators = Validators { etag: Some("\"abc\""), modified: None };
/// assert_eq!(evaluate(&Method::GET, &req, &validators), Precondition::NotModified);
/// ```
pub fn evaluate(method: &Method, req: &HeaderMap, validators: &Validators<'_>) -> Precondition {
    let mut cond = check_if_match(req, validators);
    if cond == Cond::None {
        cond = check_if_unmodified_since(req, validators);
    }
    if cond == Cond::False {
        return Precondition::Failed;
    }

    match check_if_none_match(req, validators) {
        Cond::False => {
            return if method == Method::GET || method == Method::HEAD {
                Precondition::NotModified
            } else {
                Precondition::Failed
            };
        }
        Cond::None => {
            if check_if_modified_since(method, req, validators) == Cond::False {
                return Precondition::NotModified;
            }
        }
        Cond::True => {}
    }

    let range = header(req, RANGE)
        .filter(|_| check_if_range(method, req, validators) != Cond::False)
        .map(ToString::to_string);
    Precondition::Proceed { range }
}
