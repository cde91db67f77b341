//! MIME type resolution module
//!
//! Resolves one deterministic Content-Type per file: symlinks get a fixed
//! label, otherwise the name's extension is looked up and, failing that, the
//! leading bytes are sniffed. The result is always sent explicitly so clients
//! never fall back to their own sniffing.

use crate::content::EntryKind;
use crate::error::ServeError;
use crate::http::sniff;
use std::io::{Read, Seek, SeekFrom};

/// Content-Type used for symbolic links
pub const SYMLINK_TYPE: &str = "inode/symlink";

/// Upper bound on bytes inspected when sniffing
pub const SNIFF_LEN: u64 = 3072;

/// Extension of the final path segment of `name`, without the dot
fn extension(name: &str) -> Option<&str> {
    let base = name.rsplit('/').next().unwrap_or(name);
    let (_, ext) = base.rsplit_once('.')?;
    (!ext.is_empty()).then_some(ext)
}

/// Look up a MIME type from the extension of `name`
///
/// # Examples
/// ```
/// use rangegate::http::mime::type_by_extension;
/// assert_eq!(type_by_extension("photo.PNG"), Some("image/png"));
/// assert_eq!(type_by_extension("dir.d/README"), None);
/// ```
pub fn type_by_extension(name: &str) -> Option<&'static str> {
    mime_guess::from_ext(extension(name)?).first_raw()
}

/// Drop parameters from HTML types and leave the charset to the client
pub fn normalize(ctype: &str) -> &str {
    if ctype.starts_with("text/html;") {
        "text/html"
    } else {
        ctype
    }
}

/// Sniff the type from at most [`SNIFF_LEN`] leading bytes of `reader`
pub fn sniff_type<R: Read>(reader: R) -> std::io::Result<&'static str> {
    let mut prefix = Vec::with_capacity(512);
    reader.take(SNIFF_LEN).read_to_end(&mut prefix)?;
    Ok(sniff::detect(&prefix))
}

/// Resolve the Content-Type for a file
///
/// `content` must be positioned at offset 0. When sniffing is needed it is
/// rewound to 0 afterwards; both the sniff read and the rewind are fatal for
/// the request on failure.
pub fn resolve_content_type<R: Read + Seek>(
    name: &str,
    kind: EntryKind,
    content: &mut R,
) -> Result<String, ServeError> {
    if kind == EntryKind::Symlink {
        return Ok(SYMLINK_TYPE.to_string());
    }

    let ctype = match type_by_extension(name) {
        Some(ctype) => ctype,
        None => {
            let sniffed = sniff_type(&mut *content).map_err(ServeError::Detection)?;
            content
                .seek(SeekFrom::Start(0))
                .map_err(ServeError::Rewind)?;
            sniffed
        }
    };

    Ok(normalize(ctype).to_string())
}
