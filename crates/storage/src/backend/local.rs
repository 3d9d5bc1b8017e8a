//! A directory on the local filesystem.

use crate::backend::FileInfoStream;
use crate::error::ErrorKind;
use crate::{StorageBackend, error::Result, file::FileInfo, path::validate as validate_path};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::{Metadata, create_dir_all as sync_create_dir};
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};

enum WalkEntry {
    File(FileInfo),
    Descend(PathBuf),
    Skip,
}

/// A directory on the local filesystem. The root must be absolute.
///
/// ```no_run
/// use ctpack_storage::backend::LocalBackend;
///
/// # fn example() -> ctpack_storage::error::Result<()> {
/// let source = LocalBackend::existing("ctgp", "/mnt/ctgp/ctgpr")?;
/// let output = LocalBackend::new("output", "/srv/packs/ctgp")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    root: PathBuf,
}
impl LocalBackend {
    /// Create a backend rooted at `root`, creating the directory if it
    /// doesn't exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists but isn't a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = Self::check_root(root.as_ref())?;
        if !root.exists() {
            // Only happens once per run; not worth making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }
        Ok(Self { name: name.into(), root })
    }

    /// Create a backend over a directory that must already exist. Used for
    /// input sources, where a missing directory is a configuration mistake.
    pub fn existing(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = Self::check_root(root.as_ref())?;
        if !root.exists() {
            exn::bail!(ErrorKind::NotFound(root));
        }
        Ok(Self { name: name.into(), root })
    }

    fn check_root(root: &Path) -> Result<PathBuf> {
        if !root.is_absolute() || (root.exists() && !root.is_dir()) {
            exn::bail!(ErrorKind::InvalidPath(root.to_path_buf()));
        }
        Ok(root.to_path_buf())
    }

    fn absolute_path(&self, path: &Path) -> Result<PathBuf> {
        Ok(self.root.join(validate_path(path)?))
    }

    /// Convert a path found while walking back to a storage path.
    fn relative_path(&self, found: &Path) -> Result<PathBuf> {
        let relative = found.strip_prefix(&self.root).or_raise(|| ErrorKind::OutsideRoot(found.to_path_buf()))?;
        validate_path(relative)
    }

    fn metadata(path: &Path, metadata: Metadata) -> Result<FileInfo> {
        let modified = metadata.modified().map_err(ErrorKind::Io)?.into();
        Ok(FileInfo::new(path, metadata.len(), modified))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    /// One directory entry of the walk. Errors can't be `?`'d inside the
    /// stream, so they come back here and the loop yields them.
    async fn visit(&self, entry: DirEntry) -> Result<WalkEntry> {
        let path = entry.path();
        if is_hidden(&path) {
            return Ok(WalkEntry::Skip);
        }
        let metadata = entry.metadata().await.map_err(|e| Self::map_io_error(e, &path))?;
        if metadata.is_dir() {
            return Ok(WalkEntry::Descend(path));
        }
        if metadata.is_file() {
            let relative = self.relative_path(&path)?;
            return Ok(WalkEntry::File(Self::metadata(&relative, metadata)?));
        }
        // Broken symlinks and special files are dropped.
        Ok(WalkEntry::Skip)
    }
}

/// Dotfiles, including the `._NAME.SZS` resource forks macOS leaves on FAT
/// volumes and the staging files of an interrupted run.
fn is_hidden(path: &Path) -> bool {
    path.file_name().and_then(|name| name.to_str()).is_some_and(|name| name.starts_with('.'))
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream(&self) -> FileInfoStream<'_> {
        let mut pending = vec![self.root.clone()];
        Box::pin(stream! {
            while let Some(dir) = pending.pop() {
                let mut entries = match fs::read_dir(&dir).await {
                    Ok(entries) => entries,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, &dir)));
                        continue;
                    },
                };
                loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break,
                        Err(err) => {
                            yield Err(exn::Exn::from(Self::map_io_error(err, &dir)));
                            break;
                        },
                    };
                    match self.visit(entry).await {
                        Ok(WalkEntry::File(file)) => yield Ok(file),
                        Ok(WalkEntry::Descend(sub)) => pending.push(sub),
                        Ok(WalkEntry::Skip) => {},
                        Err(err) => yield Err(err),
                    }
                }
            }
        })
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let target = self.absolute_path(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, path))?;
        }
        tracing::debug!(backend = %self.name, path = %path.display(), bytes = data.len(), "Writing file");
        Ok(fs::write(&target, data).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn locate(&self, path: &Path) -> Result<PathBuf> {
        self.absolute_path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(dir: &tempfile::TempDir) -> LocalBackend {
        LocalBackend::new("output", dir.path()).unwrap()
    }

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("output", temp_dir.path()).is_ok());
        assert!(LocalBackend::new("output", "relative/path").is_err());
        assert!(LocalBackend::new("output", "./relative").is_err());
    }

    #[test]
    fn test_new_creates_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("pack/output");
        LocalBackend::new("output", &root).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn test_existing_requires_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = LocalBackend::existing("source", temp_dir.path().join("missing")).err().unwrap();
        assert!(matches!(&*missing, ErrorKind::NotFound(_)));
        std::fs::write(temp_dir.path().join("file.szs"), b"data").unwrap();
        let file = LocalBackend::existing("source", temp_dir.path().join("file.szs")).err().unwrap();
        assert!(matches!(&*file, ErrorKind::InvalidPath(_)));
    }

    #[test]
    fn test_relative_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = backend(&temp_dir);
        let found = temp_dir.path().join("tracks/3054.szs");
        assert_eq!(backend.relative_path(&found).unwrap(), Path::new("tracks/3054.szs"));
        let err = backend.relative_path(Path::new("/other/file.szs")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::OutsideRoot(_)));
    }

    #[tokio::test]
    async fn test_write_creates_parents() {
        let temp_dir = tempfile::tempdir().unwrap();
        backend(&temp_dir).write(Path::new("a/b/manifest.ini"), b"[Pack Info]").await.unwrap();
        assert_eq!(std::fs::read(temp_dir.path().join("a/b/manifest.ini")).unwrap(), b"[Pack Info]");
    }

    #[tokio::test]
    async fn test_list_walks_subdirectories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = backend(&temp_dir);
        backend.write(Path::new("COURSE/a.szs"), b"Yaz0....").await.unwrap();
        backend.write(Path::new("COURSE/ARENA/b.szs"), b"Yaz0").await.unwrap();
        let mut files = backend.list().await.unwrap();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        let paths: Vec<_> = files.iter().map(|file| file.path.as_path()).collect();
        assert_eq!(paths, [Path::new("COURSE/ARENA/b.szs"), Path::new("COURSE/a.szs")]);
        assert_eq!(files[1].size, 8);
    }

    #[tokio::test]
    async fn test_list_skips_hidden_entries() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = backend(&temp_dir);
        backend.write(Path::new("COURSE/._STAR_SLOPE.SZS"), b"fork").await.unwrap();
        backend.write(Path::new(".Trashes/OLD.SZS"), b"old").await.unwrap();
        backend.write(Path::new("COURSE/STAR_SLOPE.SZS"), b"Yaz0").await.unwrap();
        let files = backend.list().await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, Path::new("COURSE/STAR_SLOPE.SZS"));
    }

    #[tokio::test]
    async fn test_list_vanished_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("volume");
        let backend = LocalBackend::new("volume", &root).unwrap();
        std::fs::remove_dir(&root).unwrap();
        let err = backend.list().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_paths_stay_inside_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = backend(&temp_dir);
        let located = backend.locate(Path::new("thumbnails/03054.jpg")).await.unwrap();
        assert_eq!(located, temp_dir.path().join("thumbnails/03054.jpg"));
        assert!(backend.locate(Path::new("../escape.jpg")).await.is_err());
        assert!(backend.write(Path::new("etc/../../passwd"), b"data").await.is_err());
    }
}
