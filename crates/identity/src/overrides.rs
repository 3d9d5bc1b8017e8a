//! Manually curated metadata for content the track database doesn't know.
//!
//! Some tracks were distributed without ever being published to the archive
//! (or were pulled from it later), so no database entry or alias will ever
//! resolve them. They still belong in the pack, so their metadata is curated
//! by hand here.

use crate::error::Result;
use crate::{Category, ContentHash, TrackDatabase, TrackRecord, table};
use std::collections::HashMap;
use std::path::Path;
use tracing::instrument;

/// Tracks that shipped in the distribution but never made it to the archive.
const UNRELEASED: &[(&str, &str, u32)] = &[
    ("4f86672b7014baf1f496e36ecf0c55ac455bf329", "Star Slope", 0x00),
    ("a8c1bf56c551246a128a7a3dcd3a8864ceda32e4", "Jungle Jamble", 0x1B),
    // Pulled from the archive along with its animated preview.
    ("cd19d287b6578a396c8a4ec77acf0c633b5c75a8", "Disco Fever", 0x02),
];

/// Fallback metadata source consulted only after the database and the alias
/// graph have both failed to resolve a hash.
#[derive(Debug, Default, Clone)]
pub struct OverrideTable {
    records: HashMap<ContentHash, TrackRecord>,
}
impl OverrideTable {
    /// The built-in unreleased tracks only.
    pub fn builtin() -> Self {
        let records = UNRELEASED
            .iter()
            .filter_map(|(sha1, name, slot)| {
                let hash: ContentHash = sha1.parse().ok()?;
                Some((hash, TrackRecord::new(hash.to_hex(), *name, Category::Race, *slot)))
            })
            .collect();
        Self { records }
    }

    /// The built-in table with the entries of a `[[tracks]]` TOML file layered
    /// on top. File entries replace built-ins that share a hash; track ids
    /// must stay unique across both.
    #[instrument(level = "debug")]
    pub fn load(path: &Path) -> Result<Self> {
        let table = Self::builtin().layered(&table::read(path)?, path)?;
        tracing::info!(path = %path.display(), overrides = table.len(), "Loaded override table");
        Ok(table)
    }

    pub fn layered(mut self, contents: &str, origin: &Path) -> Result<Self> {
        self.records.extend(table::parse(contents, origin)?);
        table::unique_ids(self.records.values())?;
        Ok(self)
    }

    /// Fails if an override would give a track id that the database already
    /// assigns to different content. Hashes the database knows are skipped,
    /// since the database wins for those.
    pub fn check_against(&self, database: &TrackDatabase) -> Result<()> {
        let reachable = self.records.iter().filter(|(hash, _)| !database.contains(hash)).map(|(_, record)| record);
        table::unique_ids(database.records().chain(reachable))
    }

    pub fn get(&self, hash: &ContentHash) -> Option<&TrackRecord> {
        self.records.get(hash)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
impl FromIterator<(ContentHash, TrackRecord)> for OverrideTable {
    fn from_iter<I: IntoIterator<Item = (ContentHash, TrackRecord)>>(iter: I) -> Self {
        Self { records: iter.into_iter().collect() }
    }
}
