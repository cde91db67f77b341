//! Request path resolution
//!
//! Maps `/<namespace>/<path>` onto the directory mounted under that
//! namespace. The final path segment is not followed, so a symlink inside a
//! mount is served as a link rather than as its target.

use crate::content::FileSource;
use crate::http::cache::{content_id, CachePolicy};
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

/// A directory exposed under one namespace
#[derive(Debug, Clone)]
pub struct Mount {
    pub root: PathBuf,
    pub policy: CachePolicy,
}

/// Mounts keyed by namespace
pub type Mounts = HashMap<String, Mount>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no mount for namespace")]
    UnknownNamespace,
    #[error("path is not valid")]
    BadPath,
    #[error("path escapes its mount")]
    Forbidden,
    #[error("directories are not served")]
    Directory,
    #[error("not found")]
    NotFound,
}

/// A file ready to be handed to the orchestrator
#[derive(Debug)]
pub struct ResolvedFile {
    pub namespace: String,
    pub source: FileSource,
    pub content_id: String,
    pub modified: Option<SystemTime>,
    pub policy: CachePolicy,
}

/// Resolve `request_path` (still percent-encoded) against `mounts`
pub fn resolve(mounts: &Mounts, request_path: &str) -> Result<ResolvedFile, ResolveError> {
    let rest = request_path.strip_prefix('/').ok_or(ResolveError::BadPath)?;
    let (namespace, rel) = rest.split_once('/').unwrap_or((rest, ""));
    let mount = mounts
        .get(namespace)
        .ok_or(ResolveError::UnknownNamespace)?;

    // Percent-decode once
    let decoded = percent_encoding::percent_decode_str(rel)
        .decode_utf8()
        .map_err(|_| ResolveError::BadPath)?;
    let relative = PathBuf::from(decoded.trim_start_matches('/'));

    for component in relative.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(ResolveError::Forbidden),
        }
    }
    let file_name = relative.file_name().ok_or(ResolveError::Directory)?;

    let base = mount
        .root
        .canonicalize()
        .map_err(|_| ResolveError::NotFound)?;
    let parent = mount
        .root
        .join(&relative)
        .parent()
        .map(Path::canonicalize)
        .ok_or(ResolveError::NotFound)?
        .map_err(|_| ResolveError::NotFound)?;
    if !parent.starts_with(&base) {
        return Err(ResolveError::Forbidden);
    }

    let target = parent.join(file_name);
    let metadata = fs::symlink_metadata(&target).map_err(|_| ResolveError::NotFound)?;
    if metadata.is_dir() {
        return Err(ResolveError::Directory);
    }
    let source = FileSource::new(&target).map_err(|_| ResolveError::NotFound)?;
    let modified = metadata.modified().ok();

    Ok(ResolvedFile {
        namespace: namespace.to_string(),
        content_id: content_id(metadata.len(), modified),
        modified,
        policy: mount.policy,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentSource, EntryKind};

    fn mounts(root: &Path) -> Mounts {
        let mut mounts = Mounts::new();
        mounts.insert(
            "media".to_string(),
            Mount {
                root: root.to_path_buf(),
                policy: CachePolicy::Public(60),
            },
        );
        mounts
    }

    #[test]
    fn test_resolve_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/my file.txt"), b"hello").unwrap();

        let resolved = resolve(&mounts(dir.path()), "/media/sub/my%20file.txt").unwrap();
        assert_eq!(resolved.namespace, "media");
        assert_eq!(resolved.policy, CachePolicy::Public(60));
        assert!(resolved.content_id.starts_with("5-"));
        assert!(resolved.source.path().ends_with("sub/my file.txt"));
    }

    #[test]
    fn test_unknown_namespace() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            resolve(&mounts(dir.path()), "/other/a.txt").unwrap_err(),
            ResolveError::UnknownNamespace
        );
    }

    #[test]
    fn test_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let m = mounts(dir.path());
        assert_eq!(
            resolve(&m, "/media/../etc/passwd").unwrap_err(),
            ResolveError::Forbidden
        );
        assert_eq!(
            resolve(&m, "/media/%2e%2e/etc/passwd").unwrap_err(),
            ResolveError::Forbidden
        );
    }

    #[test]
    fn test_directory_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let m = mounts(dir.path());
        assert_eq!(resolve(&m, "/media/sub").unwrap_err(), ResolveError::Directory);
        assert_eq!(resolve(&m, "/media/").unwrap_err(), ResolveError::Directory);
        assert_eq!(resolve(&m, "/media/nope.txt").unwrap_err(), ResolveError::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("target.png"), b"png bytes").unwrap();
        std::os::unix::fs::symlink("target.png", dir.path().join("link.png")).unwrap();

        let resolved = resolve(&mounts(dir.path()), "/media/link.png").unwrap();
        assert_eq!(resolved.source.kind(), EntryKind::Symlink);
    }
}
