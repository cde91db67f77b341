//! In-memory content source

use super::{ContentSource, EntryKind, SourceError};
use hyper::body::Bytes;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Content held in a shared buffer
///
/// Every call to [`ContentSource::open`] is counted so callers can tell how
/// often a reader had to be restarted.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
    kind: EntryKind,
    opens: Arc<AtomicUsize>,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            kind: EntryKind::Regular,
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Symlink entry whose bytes are the link target
    pub fn symlink(target: impl Into<Bytes>) -> Self {
        Self {
            kind: EntryKind::Symlink,
            ..Self::new(target)
        }
    }

    /// Number of readers handed out so far
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::Relaxed)
    }
}

impl ContentSource for MemorySource {
    fn size(&self) -> Result<u64, SourceError> {
        Ok(self.data.len() as u64)
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        self.opens.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(Cursor::new(self.data.clone())))
    }

    fn kind(&self) -> EntryKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_counts_and_reads_from_start() {
        let source = MemorySource::new(&b"hello"[..]);
        let mut first = String::new();
        source.open().unwrap().read_to_string(&mut first).unwrap();
        let mut second = String::new();
        source.open().unwrap().read_to_string(&mut second).unwrap();

        assert_eq!(first, "hello");
        assert_eq!(second, "hello");
        assert_eq!(source.opens(), 2);
        assert_eq!(source.size().unwrap(), 5);
    }

    #[test]
    fn test_symlink_kind() {
        assert_eq!(MemorySource::symlink("target").kind(), EntryKind::Symlink);
        assert_eq!(MemorySource::new("data").kind(), EntryKind::Regular);
    }
}
