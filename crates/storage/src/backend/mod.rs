//! Where track containers come from and where the pack goes.
//!
//! Inputs (the mounted distribution volume, loose track folders) are read
//! through a [`ReadOnlyBackend`] so that a misconfigured run can never touch
//! them; the pack output directory is a plain [`LocalBackend`].

mod local;
mod ro;

pub use self::local::LocalBackend;
pub use self::ro::ReadOnlyBackend;
use crate::error::Result;
use crate::file::FileInfo;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::{Path, PathBuf};
use std::pin::Pin;

pub type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// A directory tree of track files.
///
/// Paths handed to and returned from a backend are relative to its root and
/// pass through [`validate_path`](crate::validate_path), so nothing can
/// escape the root.
///
/// ```
/// use std::path::Path;
/// use ctpack_storage::{backend::StorageBackend, error::Result};
///
/// async fn publish(output: &dyn StorageBackend, manifest: &str) -> Result<()> {
///     output.write(Path::new("manifest.ini"), manifest.as_bytes()).await
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Identifies the backend in logs and keys its entries in the hash cache.
    fn name(&self) -> &str;

    /// Every file under the root, in no particular order.
    async fn list(&self) -> Result<Vec<FileInfo>> {
        self.list_stream().try_collect().await
    }

    /// Stream every file under the root as it is found. Hidden files and
    /// directories (a leading `.`) are skipped.
    fn list_stream(&self) -> FileInfoStream<'_>;

    /// Create or replace a file, creating parent directories as needed.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// The on-disk location of `path`, for handing to external tools. Neither
    /// the file nor its parent need exist.
    async fn locate(&self, path: &Path) -> Result<PathBuf>;
}
