//! HTTP cache control module
//!
//! Provides content identifiers, `ETag` values and the Cache-Control policy
//! applied before a file is handed to the range responder.

use hyper::header::{HeaderValue, CACHE_CONTROL, ETAG};
use hyper::HeaderMap;
use std::time::SystemTime;

/// One year minus change, the lifetime advertised for immutable content
pub const IMMUTABLE_MAX_AGE: u32 = 29_030_400;

/// Derive a content identifier from size and modification time
///
/// Format: `size-mtime_secs` in hex, the same shape static servers use for
/// weak validators.
pub fn content_id(size: u64, modified: Option<SystemTime>) -> String {
    let mtime_secs = modified
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_secs());
    format!("{size:x}-{mtime_secs:x}")
}

/// Quoted `ETag` for a content identifier, e.g. `"3e8-65a1b2c3"`
pub fn etag_for(content_id: &str) -> String {
    format!("\"{content_id}\"")
}

/// Cache control policy of a mount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Content never changes under its path; cache forever
    Immutable,
    /// Public cache with specified max-age (seconds)
    Public(u32),
    /// Revalidate on every use
    NoCache,
}

impl CachePolicy {
    pub const fn for_mount(immutable: bool, max_age: u32) -> Self {
        match (immutable, max_age) {
            (true, _) => Self::Immutable,
            (false, 0) => Self::NoCache,
            (false, secs) => Self::Public(secs),
        }
    }

    /// Convert to Cache-Control header value
    pub fn to_header_value(self) -> String {
        match self {
            Self::Immutable => format!("public, max-age={IMMUTABLE_MAX_AGE}, immutable"),
            Self::Public(max_age) => format!("public, max-age={max_age}"),
            Self::NoCache => "no-cache".to_string(),
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::Public(3600) // 1 hour
    }
}

/// Set `ETag` and `Cache-Control`, returning the validator timestamp to use
///
/// Immutable content is validated by its `ETag` alone, so no modification time
/// is returned for it and no `Last-Modified` header will be sent.
pub fn add_cache_control_headers(
    headers: &mut HeaderMap,
    content_id: &str,
    modified: Option<SystemTime>,
    policy: CachePolicy,
) -> Option<SystemTime> {
    if let Ok(etag) = HeaderValue::from_str(&etag_for(content_id)) {
        headers.insert(ETAG, etag);
    }
    if let Ok(value) = HeaderValue::from_str(&policy.to_header_value()) {
        headers.insert(CACHE_CONTROL, value);
    }

    match policy {
        CachePolicy::Immutable => None,
        CachePolicy::Public(_) | CachePolicy::NoCache => modified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_content_id() {
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(0x65a1_b2c3);
        assert_eq!(content_id(1000, Some(mtime)), "3e8-65a1b2c3");
        assert_eq!(content_id(16, None), "10-0");
    }

    #[test]
    fn test_content_id_consistency() {
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(42);
        assert_eq!(content_id(10, Some(mtime)), content_id(10, Some(mtime)));
        assert_ne!(content_id(10, Some(mtime)), content_id(11, Some(mtime)));
    }

    #[test]
    fn test_cache_policy() {
        assert_eq!(
            CachePolicy::Immutable.to_header_value(),
            "public, max-age=29030400, immutable"
        );
        assert_eq!(
            CachePolicy::Public(3600).to_header_value(),
            "public, max-age=3600"
        );
        assert_eq!(CachePolicy::NoCache.to_header_value(), "no-cache");
        assert_eq!(CachePolicy::for_mount(true, 60), CachePolicy::Immutable);
        assert_eq!(CachePolicy::for_mount(false, 60), CachePolicy::Public(60));
        assert_eq!(CachePolicy::for_mount(false, 0), CachePolicy::NoCache);
    }

    #[test]
    fn test_immutable_headers_drop_modtime() {
        let mut headers = HeaderMap::new();
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1000);
        let modtime =
            add_cache_control_headers(&mut headers, "abc", Some(mtime), CachePolicy::Immutable);

        assert_eq!(modtime, None);
        assert_eq!(headers.get(ETAG).unwrap(), "\"abc\"");
        assert_eq!(
            headers.get(CACHE_CONTROL).unwrap(),
            "public, max-age=29030400, immutable"
        );
    }

    #[test]
    fn test_mutable_headers_keep_modtime() {
        let mut headers = HeaderMap::new();
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1000);
        let modtime =
            add_cache_control_headers(&mut headers, "abc", Some(mtime), CachePolicy::Public(60));

        assert_eq!(modtime, Some(mtime));
        assert_eq!(headers.get(CACHE_CONTROL).unwrap(), "public, max-age=60");
    }
}
