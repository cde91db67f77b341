//! HTTP Range request parsing module
//!
//! Range header parsing for resumable downloads and media seeking, compliant
//! with RFC 7233. Multiple comma-separated ranges are supported.

/// One satisfiable byte range, clamped to the content size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// Start byte position
    pub start: u64,
    /// Number of bytes, always at least one
    pub length: u64,
}

impl ByteRange {
    /// Inclusive end position
    #[inline]
    pub const fn end(&self) -> u64 {
        self.start + self.length - 1
    }

    /// Value for the `Content-Range` header
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{size}", self.start, self.end())
    }
}

/// Range header parse result
#[derive(Debug, PartialEq, Eq)]
pub enum RangeParseResult {
    /// No Range header; serve the full content
    None,
    /// One or more satisfiable ranges, in request order
    Valid(Vec<ByteRange>),
    /// Well-formed, but no range overlaps the content - 416 with `bytes */size`
    NotSatisfiable,
    /// Malformed header - 416
    Invalid,
}

/// Parse HTTP Range header (bytes unit)
///
/// Supported formats, comma separated:
/// - `start-end` - Specific range (end clamped to the last byte)
/// - `start-` - From start to end
/// - `-suffix` - Last suffix bytes
///
/// Ranges starting past the end are dropped; if that leaves nothing the
/// header is not satisfiable.
///
/// # Examples
/// ```
/// use rangegate::http::range::{parse_range_header, ByteRange, RangeParseResult};
///
/// let result = parse_range_header(Some("bytes=0-99"), 1000);
/// assert_eq!(result, RangeParseResult::Valid(vec![ByteRange { start: 0, length: 100 }]));
///
/// assert_eq!(parse_range_header(None, 1000), RangeParseResult::None);
/// ```
pub fn parse_range_header(range_header: Option<&str>, size: u64) -> RangeParseResult {
    let Some(header) = range_header.filter(|h| !h.is_empty()) else {
        return RangeParseResult::None;
    };

    let Some(parts) = header.strip_prefix("bytes=") else {
        return RangeParseResult::Invalid;
    };

    let mut ranges = Vec::new();
    let mut no_overlap = false;

    for part in parts.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((start_str, end_str)) = part.split_once('-') else {
            return RangeParseResult::Invalid;
        };
        let (start_str, end_str) = (start_str.trim(), end_str.trim());

        let parsed = if start_str.is_empty() {
            parse_suffix_range(end_str, size)
        } else {
            parse_standard_range(start_str, end_str, size)
        };

        match parsed {
            Part::Range(range) => ranges.push(range),
            Part::NoOverlap => no_overlap = true,
            Part::Invalid => return RangeParseResult::Invalid,
        }
    }

    if ranges.is_empty() {
        return if no_overlap {
            RangeParseResult::NotSatisfiable
        } else {
            RangeParseResult::None
        };
    }

    RangeParseResult::Valid(ranges)
}

/// Outcome for a single range
enum Part {
    Range(ByteRange),
    NoOverlap,
    Invalid,
}

/// Parse suffix range (e.g., "-500")
fn parse_suffix_range(suffix_str: &str, size: u64) -> Part {
    if !is_digits(suffix_str) {
        return Part::Invalid;
    }
    let Ok(suffix) = suffix_str.parse::<u64>() else {
        return Part::Invalid;
    };

    if suffix == 0 || size == 0 {
        return Part::NoOverlap;
    }

    // Suffix larger than the content selects all of it
    let length = suffix.min(size);
    Part::Range(ByteRange {
        start: size - length,
        length,
    })
}

/// Parse standard range (e.g., "0-99" or "100-")
fn parse_standard_range(start_str: &str, end_str: &str, size: u64) -> Part {
    if !is_digits(start_str) {
        return Part::Invalid;
    }
    let Ok(start) = start_str.parse::<u64>() else {
        return Part::Invalid;
    };

    let end = if end_str.is_empty() {
        None
    } else {
        if !is_digits(end_str) {
            return Part::Invalid;
        }
        let Ok(end) = end_str.parse::<u64>() else {
            return Part::Invalid;
        };
        if start > end {
            return Part::Invalid;
        }
        Some(end)
    };

    // Start beyond content size cannot be served
    if start >= size {
        return Part::NoOverlap;
    }

    let last = end.map_or(size - 1, |e| e.min(size - 1));
    Part::Range(ByteRange {
        start,
        length: last - start + 1,
    })
}

/// `str::parse` accepts a leading `+`, the header grammar does not
fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Total bytes selected by `ranges`
pub fn total_length(ranges: &[ByteRange]) -> u64 {
    ranges.iter().map(|r| r.length).sum()
}
