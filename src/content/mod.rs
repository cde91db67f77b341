//! Content source module
//!
//! Describes the bytes behind a served file as a capability-restricted source:
//! it knows its size and can hand out fresh sequential readers, nothing more.
//! Random access is layered on top by [`LazySeeker`].

mod file;
mod memory;
mod seeker;

pub use file::FileSource;
pub use memory::MemorySource;
pub use seeker::LazySeeker;

use std::io::{self, Read};
use std::time::SystemTime;
use thiserror::Error;

/// Kind of directory entry backing a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Regular,
    /// Symbolic link; its bytes are the link target, not a payload
    Symlink,
}

/// Error reported by a content source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("content size is unknown")]
    UnknownSize,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Error reported when repositioning a [`LazySeeker`]
#[derive(Debug, Error)]
pub enum SeekError {
    #[error("invalid seek offset {offset} (content is {size} bytes)")]
    InvalidOffset { offset: i128, size: u64 },
    #[error("cannot restart content source: {0}")]
    Reopen(#[source] io::Error),
}

impl From<SeekError> for io::Error {
    fn from(err: SeekError) -> Self {
        match err {
            SeekError::InvalidOffset { .. } => Self::new(io::ErrorKind::InvalidInput, err),
            SeekError::Reopen(inner) => inner,
        }
    }
}

/// Sized, sequentially readable content
///
/// Implementations are request-local and never shared between requests.
/// Nothing here promises native seeking: a backward move is served by
/// calling [`ContentSource::open`] again and discarding up to the target.
pub trait ContentSource: Send {
    /// Total number of bytes the source yields from a fresh reader
    fn size(&self) -> Result<u64, SourceError>;

    /// Open a new reader positioned at the first byte
    fn open(&self) -> io::Result<Box<dyn Read + Send>>;

    fn kind(&self) -> EntryKind {
        EntryKind::Regular
    }
}

impl<S: ContentSource + ?Sized> ContentSource for Box<S> {
    fn size(&self) -> Result<u64, SourceError> {
        (**self).size()
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        (**self).open()
    }

    fn kind(&self) -> EntryKind {
        (**self).kind()
    }
}

/// Per-request facts about the served content, fixed once resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDescriptor {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub modified: Option<SystemTime>,
}
