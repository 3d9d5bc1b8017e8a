//! Repository for content-hash entries.
//!
//! Entries are keyed by `(source, path)`: the name of the input backend the
//! file was listed from and its path relative to that backend's root.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{HashRow, path_column};
use ctpack_identity::ContentHash;
use ctpack_storage::file::FileInfo;
use exn::ResultExt;
use sqlx::SqlitePool;
use std::path::Path;

/// Result of looking up a file in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Nothing is recorded for this path.
    Miss,
    /// The recorded size and modification time match; the hash can be reused.
    Fresh(ContentHash),
    /// A hash is recorded but the file has changed since. It must be
    /// recalculated.
    Stale,
}

#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up the cached hash for a listed file.
    pub async fn lookup(&self, source: &str, file: &FileInfo) -> Result<Lookup> {
        let row: Option<HashRow> = sqlx::query_as(include_str!("../queries/get_by_source_path.sql"))
            .bind(source)
            .bind(path_column(&file.path)?)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let Some(row) = row else {
            return Ok(Lookup::Miss);
        };
        match row.matches(file)? {
            true => Ok(Lookup::Fresh(row.content_hash()?)),
            false => Ok(Lookup::Stale),
        }
    }

    /// Record (or replace) the hash of a listed file.
    pub async fn upsert(&self, source: &str, file: &FileInfo, hash: &ContentHash) -> Result<()> {
        let row = HashRow::new(source, file, hash)?;
        sqlx::query(include_str!("../queries/upsert_hash.sql"))
            .bind(row.source)
            .bind(row.path)
            .bind(row.size)
            .bind(row.modified)
            .bind(row.content_hash)
            .bind(row.hashed_at)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Forget a path. Returns `true` if an entry was removed.
    pub async fn delete_by_path(&self, source: &str, path: impl AsRef<Path>) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/delete_by_source_path.sql"))
            .bind(source)
            .bind(path_column(path.as_ref())?)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of entries recorded for a source.
    pub async fn count(&self, source: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/count_for_source.sql"))
            .bind(source)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("count"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use time::{Duration, OffsetDateTime};

    const STAR_SLOPE: &str = "4f86672b7014baf1f496e36ecf0c55ac455bf329";
    const DISCO_FEVER: &str = "cd19d287b6578a396c8a4ec77acf0c633b5c75a8";

    #[fixture]
    fn file() -> FileInfo {
        FileInfo::new("Course/STAR_SLOPE.SZS", 2048, OffsetDateTime::now_utc())
    }

    async fn repository() -> Repository {
        let db = Database::connect_in_memory().await.unwrap();
        Repository::from(&db)
    }

    #[rstest]
    #[tokio::test]
    async fn test_miss_then_fresh(file: FileInfo) {
        let repo = repository().await;
        assert_eq!(repo.lookup("ctgp", &file).await.unwrap(), Lookup::Miss);
        let hash: ContentHash = STAR_SLOPE.parse().unwrap();
        repo.upsert("ctgp", &file, &hash).await.unwrap();
        assert_eq!(repo.lookup("ctgp", &file).await.unwrap(), Lookup::Fresh(hash));
        // Same path under another source is unrelated.
        assert_eq!(repo.lookup("loose", &file).await.unwrap(), Lookup::Miss);
    }

    #[rstest]
    #[case::resized(4096, 0)]
    #[case::touched(2048, 5)]
    #[tokio::test]
    async fn test_stale(file: FileInfo, #[case] size: u64, #[case] later: i64) {
        let repo = repository().await;
        repo.upsert("ctgp", &file, &STAR_SLOPE.parse().unwrap()).await.unwrap();
        let changed = FileInfo { size, modified: file.modified + Duration::seconds(later), ..file.clone() };
        assert_eq!(repo.lookup("ctgp", &changed).await.unwrap(), Lookup::Stale);
    }

    #[rstest]
    #[tokio::test]
    async fn test_upsert_replaces(file: FileInfo) {
        let repo = repository().await;
        repo.upsert("ctgp", &file, &STAR_SLOPE.parse().unwrap()).await.unwrap();
        let replaced = FileInfo { size: 1, ..file.clone() };
        let hash: ContentHash = DISCO_FEVER.parse().unwrap();
        repo.upsert("ctgp", &replaced, &hash).await.unwrap();
        assert_eq!(repo.count("ctgp").await.unwrap(), 1);
        assert_eq!(repo.lookup("ctgp", &replaced).await.unwrap(), Lookup::Fresh(hash));
        assert_eq!(repo.lookup("ctgp", &file).await.unwrap(), Lookup::Stale);
    }

    #[rstest]
    #[tokio::test]
    async fn test_delete_by_path(file: FileInfo) {
        let repo = repository().await;
        repo.upsert("ctgp", &file, &STAR_SLOPE.parse().unwrap()).await.unwrap();
        assert!(repo.delete_by_path("ctgp", &file.path).await.unwrap());
        assert!(!repo.delete_by_path("ctgp", &file.path).await.unwrap());
        assert_eq!(repo.lookup("ctgp", &file).await.unwrap(), Lookup::Miss);
        assert_eq!(repo.count("ctgp").await.unwrap(), 0);
    }
}
