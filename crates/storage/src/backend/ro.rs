//! Input sources must never be written to, whatever the caller asks for.

use crate::backend::FileInfoStream;
use crate::{BackendHandle, StorageBackend, error::Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Passes listing and location through to another backend and drops every
/// write, logging it instead.
#[derive(Clone)]
pub struct ReadOnlyBackend {
    inner: BackendHandle,
}
impl ReadOnlyBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StorageBackend for ReadOnlyBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn list_stream(&self) -> FileInfoStream<'_> {
        self.inner.list_stream()
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        tracing::warn!(backend = self.name(), path = %path.display(), bytes = data.len(), "Refusing to write to an input source");
        Ok(())
    }

    async fn locate(&self, path: &Path) -> Result<PathBuf> {
        self.inner.locate(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use std::sync::Arc;

    fn read_only(dir: &Path) -> ReadOnlyBackend {
        ReadOnlyBackend::new(Arc::new(LocalBackend::existing("source", dir).unwrap()))
    }

    #[tokio::test]
    async fn test_write_is_dropped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = read_only(temp_dir.path());
        backend.write(Path::new("COURSE/track.szs"), b"data").await.unwrap();
        assert!(!temp_dir.path().join("COURSE/track.szs").exists());
        assert!(backend.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_passes_through() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("COURSE")).unwrap();
        std::fs::write(temp_dir.path().join("COURSE/track.szs"), b"Yaz0").unwrap();
        let backend = read_only(temp_dir.path());
        assert_eq!(backend.name(), "source");
        assert_eq!(backend.list().await.unwrap().len(), 1);
        assert_eq!(
            backend.locate(Path::new("COURSE/track.szs")).await.unwrap(),
            temp_dir.path().join("COURSE/track.szs")
        );
    }
}
