//! Filesystem content source
//!
//! Regular files are re-opened on every [`ContentSource::open`]; symbolic links
//! are served as their target path, which is what gets labelled `inode/symlink`.

use super::{ContentSource, EntryKind, SourceError};
use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// File on local disk, addressed by path
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    kind: EntryKind,
}

impl FileSource {
    /// Inspect `path` without following a trailing symlink
    pub fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let metadata = fs::symlink_metadata(&path)?;
        let kind = if metadata.file_type().is_symlink() {
            EntryKind::Symlink
        } else if metadata.is_file() {
            EntryKind::Regular
        } else {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "not a regular file",
            ));
        };
        Ok(Self { path, kind })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Modification time of the entry itself (not of a link target)
    pub fn modified(&self) -> Option<SystemTime> {
        fs::symlink_metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()
    }

    fn link_target(&self) -> io::Result<Vec<u8>> {
        let target = fs::read_link(&self.path)?;
        Ok(target.to_string_lossy().into_owned().into_bytes())
    }
}

impl ContentSource for FileSource {
    fn size(&self) -> Result<u64, SourceError> {
        match self.kind {
            EntryKind::Regular => Ok(fs::metadata(&self.path)?.len()),
            EntryKind::Symlink => Ok(self.link_target()?.len() as u64),
        }
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        match self.kind {
            EntryKind::Regular => Ok(Box::new(File::open(&self.path)?)),
            EntryKind::Symlink => Ok(Box::new(Cursor::new(self.link_target()?))),
        }
    }

    fn kind(&self) -> EntryKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, b"0123456789").unwrap();

        let source = FileSource::new(&path).unwrap();
        assert_eq!(source.kind(), EntryKind::Regular);
        assert_eq!(source.size().unwrap(), 10);
        assert!(source.modified().is_some());

        let mut content = Vec::new();
        source.open().unwrap().read_to_end(&mut content).unwrap();
        assert_eq!(content, b"0123456789");
    }

    #[test]
    fn test_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSource::new(dir.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSource::new(dir.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_serves_target_path() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("link.png");
        std::os::unix::fs::symlink("elsewhere.png", &link).unwrap();

        let source = FileSource::new(&link).unwrap();
        assert_eq!(source.kind(), EntryKind::Symlink);
        assert_eq!(source.size().unwrap(), 13);

        let mut content = String::new();
        source.open().unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "elsewhere.png");
    }
}
