use crate::error::Result;
use crate::{ContentHash, TrackRecord, table};
use std::collections::HashMap;
use std::path::Path;
use tracing::instrument;

/// Static mapping from content hash to known-track metadata.
///
/// Loaded once at the start of a run and read-only afterwards; share it
/// between tasks behind an [`Arc`](std::sync::Arc).
#[derive(Debug, Default, Clone)]
pub struct TrackDatabase {
    records: HashMap<ContentHash, TrackRecord>,
}
impl TrackDatabase {
    /// Load the database from a TOML file containing a `[[tracks]]` array.
    #[instrument(level = "debug")]
    pub fn load(path: &Path) -> Result<Self> {
        let db = Self::from_toml(&table::read(path)?, path)?;
        tracing::info!(path = %path.display(), tracks = db.len(), "Loaded track database");
        Ok(db)
    }

    pub fn from_toml(contents: &str, origin: &Path) -> Result<Self> {
        Ok(Self { records: table::parse(contents, origin)? })
    }

    pub fn get(&self, hash: &ContentHash) -> Option<&TrackRecord> {
        self.records.get(hash)
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.records.contains_key(hash)
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = &TrackRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
impl FromIterator<(ContentHash, TrackRecord)> for TrackDatabase {
    fn from_iter<I: IntoIterator<Item = (ContentHash, TrackRecord)>>(iter: I) -> Self {
        Self { records: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Category;
    use crate::error::ErrorKind;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
                [[tracks]]
                sha1 = "a8c1bf56c551246a128a7a3dcd3a8864ceda32e4"
                id = "1207"
                name = "Jungle Jamble"
                category = "race"
                slot = 27
                music_slot = 27
            "#
        )
        .unwrap();
        let db = TrackDatabase::load(file.path()).unwrap();
        let hash: ContentHash = "a8c1bf56c551246a128a7a3dcd3a8864ceda32e4".parse().unwrap();
        assert_eq!(db.len(), 1);
        assert_eq!(
            db.get(&hash),
            Some(&TrackRecord::new("1207", "Jungle Jamble", Category::Race, 27).with_music_slot(27))
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = TrackDatabase::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(*err, ErrorKind::Io(_)));
    }
}
