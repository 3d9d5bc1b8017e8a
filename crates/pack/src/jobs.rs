//! Seams between the pipeline and the external tools it drives.
//!
//! The pipeline only ever talks to these traits; [`Wszst`] and
//! [`ThumbnailFetcher`] are the production implementations, tests substitute
//! their own.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use ctpack_identity::ContentHash;
use ctpack_tools::{ThumbnailFetcher, ThumbnailOutcome, Wszst};
use derive_more::Display;
use serde::Serialize;
use std::path::Path;

/// Computes the canonical content hash of a track container.
#[async_trait]
pub trait ContentHasher: Send + Sync {
    async fn hash(&self, path: &Path) -> Result<ContentHash>;
}

/// Re-encodes a track container into the pack's output tree.
#[async_trait]
pub trait Recompressor: Send + Sync {
    async fn recompress(&self, source: &Path, destination: &Path) -> Result<()>;
}

/// Produces a preview image for a track.
#[async_trait]
pub trait ThumbnailSource: Send + Sync {
    async fn thumbnail(&self, track_id: &str, hash: &ContentHash, destination: &Path) -> Result<ThumbnailOutcome>;

    /// Name of the thumbnail file inside the output's thumbnail directory.
    fn file_name(&self, track_id: &str, hash: &ContentHash) -> String {
        ThumbnailFetcher::file_name(track_id, hash)
    }
}

#[async_trait]
impl ContentHasher for Wszst {
    async fn hash(&self, path: &Path) -> Result<ContentHash> {
        self.sha1(path).await.map_err(ErrorKind::tool)
    }
}

#[async_trait]
impl Recompressor for Wszst {
    async fn recompress(&self, source: &Path, destination: &Path) -> Result<()> {
        self.compress(source, destination).await.map_err(ErrorKind::tool)
    }
}

#[async_trait]
impl ThumbnailSource for ThumbnailFetcher {
    async fn thumbnail(&self, track_id: &str, hash: &ContentHash, destination: &Path) -> Result<ThumbnailOutcome> {
        self.fetch(track_id, hash, destination).await.map_err(ErrorKind::tool)
    }
}

/// The side-effect jobs scheduled for each admitted track.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    #[display("recompress")]
    Recompress,
    #[display("thumbnail")]
    Thumbnail,
}
