use crate::error::{Error, ErrorKind};
use ctpack_identity::ContentHash;
use ctpack_storage::file::FileInfo;
use exn::{OptionExt, ResultExt};
use time::OffsetDateTime;

/// One row of the `hashes` table. Timestamps are stored as Unix nanoseconds
/// so that a file touched twice within a second still reads as modified.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct HashRow {
    pub source: String,
    pub path: String,
    pub size: i64,
    pub modified: i64,
    pub content_hash: String,
    pub hashed_at: i64,
}
impl HashRow {
    pub fn new(source: &str, file: &FileInfo, hash: &ContentHash) -> Result<Self, Error> {
        Ok(Self {
            source: source.to_string(),
            path: path_column(&file.path)?,
            size: i64::try_from(file.size).or_raise(|| ErrorKind::InvalidData("file size"))?,
            modified: timestamp_column(file.modified)?,
            content_hash: hash.to_hex(),
            hashed_at: timestamp_column(OffsetDateTime::now_utc())?,
        })
    }

    /// Whether the row was recorded for a file with the same size and
    /// modification time as `file`.
    pub fn matches(&self, file: &FileInfo) -> Result<bool, Error> {
        Ok(i64::try_from(file.size).ok() == Some(self.size) && timestamp_column(file.modified)? == self.modified)
    }

    pub fn content_hash(&self) -> Result<ContentHash, Error> {
        self.content_hash.parse::<ContentHash>().or_raise(|| ErrorKind::InvalidData("content hash"))
    }
}

pub(crate) fn path_column(path: &std::path::Path) -> Result<String, Error> {
    Ok(path.to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))?.to_string())
}

fn timestamp_column(at: OffsetDateTime) -> Result<i64, Error> {
    i64::try_from(at.unix_timestamp_nanos()).or_raise(|| ErrorKind::InvalidData("timestamp"))
}
