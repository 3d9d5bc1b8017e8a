//! File metadata returned by storage backends, used both for listing and as
//! the cache key for content hashes.

use std::path::PathBuf;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Relative path from storage root
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: OffsetDateTime,
}
impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: OffsetDateTime) -> Self {
        Self { path: path.into(), size, modified }
    }

    /// Whether the file's extension matches `ext`, ignoring ASCII case.
    ///
    /// Distribution volumes are FAT-formatted and typically shout their file
    /// names (`BEGINNER_COURSE.SZS`).
    pub fn has_extension(&self, ext: &str) -> bool {
        self.path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case(ext))
    }

    /// File name without its extension.
    pub fn stem(&self) -> Option<&str> {
        self.path.file_stem().and_then(|s| s.to_str())
    }
}
