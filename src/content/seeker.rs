//! Lazy seekable adapter over a forward-only content source
//!
//! Seeks only move a logical cursor. The underlying reader catches up on the
//! next read by discarding bytes, so learning the size (seek to end, seek back)
//! costs nothing. Moving behind the bytes already consumed restarts the source
//! from its first byte, which makes backward seeks strictly more expensive than
//! forward ones.

use super::{ContentSource, SeekError};
use std::io::{self, Read, Seek, SeekFrom};
use tracing::debug;

pub struct LazySeeker<S> {
    source: S,
    size: u64,
    /// Logical cursor
    offset: u64,
    /// Bytes consumed from the current reader; never above `offset`
    real_offset: u64,
    reader: Option<Box<dyn Read + Send>>,
    restarts: u32,
}

impl<S: ContentSource> LazySeeker<S> {
    pub const fn new(source: S, size: u64) -> Self {
        Self {
            source,
            size,
            offset: 0,
            real_offset: 0,
            reader: None,
            restarts: 0,
        }
    }

    pub const fn size(&self) -> u64 {
        self.size
    }

    pub const fn position(&self) -> u64 {
        self.offset
    }

    /// How many times the source was re-opened to move backwards
    pub const fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Move the cursor, reporting the typed reason on failure
    pub fn try_seek(&mut self, pos: SeekFrom) -> Result<u64, SeekError> {
        let target = match pos {
            SeekFrom::Start(n) => i128::from(n),
            SeekFrom::End(delta) => i128::from(self.size) + i128::from(delta),
            SeekFrom::Current(delta) => i128::from(self.offset) + i128::from(delta),
        };

        let offset = u64::try_from(target)
            .ok()
            .filter(|offset| *offset <= self.size)
            .ok_or(SeekError::InvalidOffset {
                offset: target,
                size: self.size,
            })?;

        if offset < self.real_offset {
            self.restart().map_err(SeekError::Reopen)?;
        }
        self.offset = offset;
        Ok(offset)
    }

    fn restart(&mut self) -> io::Result<()> {
        self.reader = None;
        self.real_offset = 0;
        self.reader = Some(self.source.open()?);
        self.restarts += 1;
        debug!(
            restarts = self.restarts,
            size = self.size,
            "restarted content source for backward seek"
        );
        Ok(())
    }

    fn premature_eof(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "content ended at byte {} of {}",
                self.real_offset, self.size
            ),
        )
    }

    fn read_from(&mut self, reader: &mut Box<dyn Read + Send>, buf: &mut [u8]) -> io::Result<usize> {
        let skip = self.offset.saturating_sub(self.real_offset);
        if skip > 0 {
            let skipped = io::copy(&mut reader.by_ref().take(skip), &mut io::sink())?;
            self.real_offset += skipped;
            if skipped < skip {
                return Err(self.premature_eof());
            }
        }

        let remaining = self.size - self.offset;
        let want = usize::try_from(remaining).map_or(buf.len(), |left| left.min(buf.len()));
        let n = reader.read(&mut buf[..want])?;
        if n == 0 {
            return Err(self.premature_eof());
        }

        self.real_offset += n as u64;
        self.offset += n as u64;
        Ok(n)
    }
}

impl<S: ContentSource> Read for LazySeeker<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.offset >= self.size {
            return Ok(0);
        }

        let mut reader = match self.reader.take() {
            Some(reader) => reader,
            None => {
                self.real_offset = 0;
                self.source.open()?
            }
        };

        let result = self.read_from(&mut reader, buf);
        if result.is_ok() {
            self.reader = Some(reader);
        } else {
            // A failed reader is dropped; the next read starts over.
            self.real_offset = 0;
        }
        result
    }
}

impl<S: ContentSource> Seek for LazySeeker<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.try_seek(pos)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{MemorySource, SourceError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn read_rest<R: Read>(reader: &mut R) -> Vec<u8> {
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        out
    }

    /// Source whose reader opens succeed only `allowed` times
    struct FlakySource {
        data: Vec<u8>,
        allowed: usize,
        opens: AtomicUsize,
    }

    impl ContentSource for FlakySource {
        fn size(&self) -> Result<u64, SourceError> {
            Ok(self.data.len() as u64)
        }

        fn open(&self) -> io::Result<Box<dyn Read + Send>> {
            if self.opens.fetch_add(1, Ordering::Relaxed) >= self.allowed {
                return Err(io::Error::other("block fetch failed"));
            }
            Ok(Box::new(io::Cursor::new(self.data.clone())))
        }
    }

    #[test]
    fn test_sequential_read() {
        let data = pattern(1000);
        let source = MemorySource::new(data.clone());
        let mut seeker = LazySeeker::new(source.clone(), 1000);

        assert_eq!(read_rest(&mut seeker), data);
        assert_eq!(seeker.position(), 1000);
        assert_eq!(source.opens(), 1);
    }

    #[test]
    fn test_forward_seek_discards_without_restart() {
        let data = pattern(1000);
        let source = MemorySource::new(data.clone());
        let mut seeker = LazySeeker::new(source.clone(), 1000);

        let mut head = [0u8; 10];
        seeker.read_exact(&mut head).unwrap();
        assert_eq!(seeker.seek(SeekFrom::Start(500)).unwrap(), 500);
        assert_eq!(read_rest(&mut seeker), &data[500..]);
        assert_eq!(source.opens(), 1);
        assert_eq!(seeker.restarts(), 0);
    }

    #[test]
    fn test_backward_seek_restarts_source() {
        let data = pattern(1000);
        let source = MemorySource::new(data.clone());
        let mut seeker = LazySeeker::new(source.clone(), 1000);

        seeker.seek(SeekFrom::Start(600)).unwrap();
        let mut chunk = [0u8; 100];
        seeker.read_exact(&mut chunk).unwrap();
        assert_eq!(&chunk[..], &data[600..700]);

        seeker.seek(SeekFrom::Start(100)).unwrap();
        seeker.read_exact(&mut chunk).unwrap();
        assert_eq!(&chunk[..], &data[100..200]);
        assert_eq!(seeker.restarts(), 1);
        assert_eq!(source.opens(), 2);
    }

    #[test]
    fn test_every_offset_reads_from_that_offset() {
        let data = pattern(257);
        let mut seeker = LazySeeker::new(MemorySource::new(data.clone()), 257);

        // Descending offsets force a restart on every step after the first.
        for offset in (0..=257u64).rev() {
            seeker.seek(SeekFrom::Start(offset)).unwrap();
            let rest = read_rest(&mut seeker);
            assert_eq!(rest, &data[usize::try_from(offset).unwrap()..], "offset {offset}");
        }
    }

    #[test]
    fn test_seek_origins() {
        let data = pattern(100);
        let mut seeker = LazySeeker::new(MemorySource::new(data.clone()), 100);

        assert_eq!(seeker.seek(SeekFrom::End(-10)).unwrap(), 90);
        assert_eq!(read_rest(&mut seeker), &data[90..]);

        seeker.seek(SeekFrom::Start(20)).unwrap();
        assert_eq!(seeker.seek(SeekFrom::Current(5)).unwrap(), 25);
        assert_eq!(seeker.seek(SeekFrom::Current(-15)).unwrap(), 10);
        let mut byte = [0u8; 1];
        seeker.read_exact(&mut byte).unwrap();
        assert_eq!(byte[0], data[10]);
    }

    #[test]
    fn test_size_probe_performs_no_io() {
        let source = MemorySource::new(pattern(100));
        let mut seeker = LazySeeker::new(source.clone(), 100);

        assert_eq!(seeker.seek(SeekFrom::End(0)).unwrap(), 100);
        assert_eq!(seeker.seek(SeekFrom::Start(0)).unwrap(), 0);
        assert_eq!(source.opens(), 0);
    }

    #[test]
    fn test_read_at_end_returns_zero() {
        let mut seeker = LazySeeker::new(MemorySource::new(pattern(10)), 10);
        seeker.seek(SeekFrom::End(0)).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(seeker.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_invalid_offsets() {
        let mut seeker = LazySeeker::new(MemorySource::new(pattern(10)), 10);

        let err = seeker.seek(SeekFrom::Current(-1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        let err = seeker.seek(SeekFrom::Start(11)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(matches!(
            seeker.try_seek(SeekFrom::End(1)),
            Err(SeekError::InvalidOffset { offset: 11, size: 10 })
        ));
        // Cursor unchanged after a rejected seek
        assert_eq!(seeker.position(), 0);
    }

    #[test]
    fn test_source_shorter_than_reported_size() {
        let mut seeker = LazySeeker::new(MemorySource::new(pattern(10)), 20);
        let mut out = Vec::new();
        let err = seeker.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        seeker.seek(SeekFrom::Start(15)).unwrap();
        let mut buf = [0u8; 4];
        let err = seeker.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_failed_restart_reported_by_seek() {
        let source = FlakySource {
            data: pattern(64),
            allowed: 1,
            opens: AtomicUsize::new(0),
        };
        let mut seeker = LazySeeker::new(source, 64);

        let mut buf = [0u8; 16];
        seeker.read_exact(&mut buf).unwrap();
        assert!(matches!(
            seeker.try_seek(SeekFrom::Start(0)),
            Err(SeekError::Reopen(_))
        ));
    }
}
