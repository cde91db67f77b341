//! Content sniffing module
//!
//! Infers a MIME type from the leading bytes of a file. Pure: the same prefix
//! always yields the same type.

/// Bytes that mark content as binary (WHATWG mime sniffing)
const fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

const fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | 0x0C | b'\r' | b' ')
}

/// HTML openers; each must be followed by a space or `>`
const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

/// Fixed signatures at offset 0
const MAGIC: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"\x89PNG\r\n\x1A\n", "image/png"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1F\x8B\x08", "application/gzip"),
    (b"7z\xBC\xAF\x27\x1C", "application/x-7z-compressed"),
    (b"OggS", "application/ogg"),
    (b"ID3", "audio/mpeg"),
    (b"\xFF\xFB", "audio/mpeg"),
    (b"\xFF\xF3", "audio/mpeg"),
    (b"\xFF\xF2", "audio/mpeg"),
    (b"fLaC", "audio/flac"),
    (b"\x00asm", "application/wasm"),
    (b"\x7FELF", "application/x-elf"),
    (b"\xFE\xFF", "text/plain; charset=utf-16be"),
    (b"\xFF\xFE", "text/plain; charset=utf-16le"),
];

fn starts_with_ignore_case(data: &[u8], pattern: &[u8]) -> bool {
    data.len() >= pattern.len() && data[..pattern.len()].eq_ignore_ascii_case(pattern)
}

fn contains(data: &[u8], needle: &[u8]) -> bool {
    data.windows(needle.len()).any(|w| w == needle)
}

/// Detect the MIME type of `data`, the leading bytes of a file
///
/// # Examples
/// ```
/// use rangegate::http::sniff::detect;
/// assert_eq!(detect(b"\xFF\xD8\xFF\xE0\x00\x10JFIF"), "image/jpeg");
/// assert_eq!(detect(b"plain words"), "text/plain; charset=utf-8");
/// assert_eq!(detect(&[0u8, 1, 2, 3]), "application/octet-stream");
/// ```
pub fn detect(data: &[u8]) -> &'static str {
    if let Some(ctype) = detect_container(data) {
        return ctype;
    }

    if let Some((_, ctype)) = MAGIC.iter().find(|(magic, _)| data.starts_with(magic)) {
        return *ctype;
    }

    let body = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    let start = body.iter().position(|b| !is_whitespace(*b)).unwrap_or(body.len());
    if let Some(ctype) = detect_markup(&body[start..]) {
        return ctype;
    }

    if is_text(body) {
        return "text/plain; charset=utf-8";
    }

    "application/octet-stream"
}

/// Known DIB header sizes: CORE, INFO, V4 and V5
const BMP_DIB_SIZES: [u32; 4] = [12, 40, 108, 124];

/// `BM` alone is too short to trust; the DIB header size at 14..18 must match
fn is_bmp(data: &[u8]) -> bool {
    if data.len() < 18 || !data.starts_with(b"BM") {
        return false;
    }
    let dib_size = u32::from_le_bytes([data[14], data[15], data[16], data[17]]);
    BMP_DIB_SIZES.contains(&dib_size)
}

/// RIFF, ISO-BMFF and EBML containers carry their real type further in, as
/// does BMP
fn detect_container(data: &[u8]) -> Option<&'static str> {
    if is_bmp(data) {
        return Some("image/bmp");
    }

    if data.len() >= 12 && data.starts_with(b"RIFF") {
        return match &data[8..12] {
            b"WEBP" => Some("image/webp"),
            b"WAVE" => Some("audio/wav"),
            b"AVI " => Some("video/x-msvideo"),
            _ => None,
        };
    }

    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        return Some(match &data[8..12] {
            b"M4A " => "audio/mp4",
            b"qt  " => "video/quicktime",
            _ => "video/mp4",
        });
    }

    if data.starts_with(b"\x1A\x45\xDF\xA3") {
        let head = &data[..data.len().min(64)];
        return Some(if contains(head, b"webm") {
            "video/webm"
        } else {
            "video/x-matroska"
        });
    }

    None
}

fn detect_markup(data: &[u8]) -> Option<&'static str> {
    if data.first() != Some(&b'<') {
        return None;
    }

    let is_html = HTML_TAGS.iter().any(|tag| {
        starts_with_ignore_case(data, tag)
            && matches!(data.get(tag.len()), Some(b' ' | b'>'))
    });
    if is_html {
        return Some("text/html; charset=utf-8");
    }

    if starts_with_ignore_case(data, b"<svg") {
        return Some("image/svg+xml");
    }

    if data.starts_with(b"<?xml") {
        return Some(if contains(data, b"<svg") {
            "image/svg+xml"
        } else {
            "text/xml; charset=utf-8"
        });
    }

    None
}

fn is_text(data: &[u8]) -> bool {
    if data.iter().copied().any(is_binary_byte) {
        return false;
    }
    match std::str::from_utf8(data) {
        Ok(_) => true,
        // A multi-byte sequence cut off by the sniff window is still text
        Err(e) => e.error_len().is_none(),
    }
}
