//! Content-Disposition module
//!
//! `?filename=` names the download (and overrides the name used for type
//! lookup); `&download=true` turns the disposition into an attachment.

use hyper::header::{HeaderValue, CONTENT_DISPOSITION};
use hyper::HeaderMap;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left alone when escaping a single path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b':')
    .remove(b'=')
    .remove(b'@');

/// Last non-empty segment of a request path
pub fn display_name(path: &str) -> &str {
    path.rsplit('/').find(|s| !s.is_empty()).unwrap_or_default()
}

fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Value for the header, e.g. `inline; filename="a.txt"; filename*=UTF-8''a.txt`
pub fn disposition_value(filename: &str, attachment: bool) -> String {
    let kind = if attachment { "attachment" } else { "inline" };
    let ascii: String = filename
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    format!(
        "{kind}; filename=\"{}\"; filename*=UTF-8''{}",
        utf8_percent_encode(&ascii, PATH_SEGMENT),
        utf8_percent_encode(filename, PATH_SEGMENT)
    )
}

/// Set `Content-Disposition` when the query asks for it and return the name
/// the rest of the pipeline should use for this file
pub fn add_content_disposition_header(
    headers: &mut HeaderMap,
    query: Option<&str>,
    path: &str,
) -> String {
    let Some(filename) = query_param(query, "filename").filter(|f| !f.is_empty()) else {
        return display_name(path).to_string();
    };

    let attachment = query_param(query, "download").as_deref() == Some("true");
    if let Ok(value) = HeaderValue::from_str(&disposition_value(&filename, attachment)) {
        headers.insert(CONTENT_DISPOSITION, value);
    }
    filename
}
