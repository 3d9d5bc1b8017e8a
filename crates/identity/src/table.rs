//! Shared TOML loading for the track database and the override table.

use crate::error::{ErrorKind, Result};
use crate::{Category, ContentHash, TrackRecord};
use exn::ResultExt;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::collections::hash_map::Entry;
use std::path::Path;

#[derive(Deserialize)]
struct TrackTable {
    #[serde(default)]
    tracks: Vec<TrackRow>,
}

#[derive(Deserialize)]
struct TrackRow {
    sha1: ContentHash,
    id: Option<String>,
    name: String,
    category: Category,
    slot: u32,
    music_slot: Option<u32>,
}
impl TrackRow {
    fn into_entry(self) -> (ContentHash, TrackRecord) {
        let id = self.id.unwrap_or_else(|| self.sha1.to_hex());
        let record = TrackRecord::new(id, self.name, self.category, self.slot).with_music_slot(self.music_slot);
        (self.sha1, record)
    }
}

pub(crate) fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).or_raise(|| ErrorKind::Io(path.to_path_buf()))
}

/// Parses a `[[tracks]]` table. `origin` is only used for error reporting.
///
/// Both hashes and track ids must be unique within the table.
pub(crate) fn parse(contents: &str, origin: &Path) -> Result<HashMap<ContentHash, TrackRecord>> {
    let table: TrackTable = toml::from_str(contents).or_raise(|| ErrorKind::Malformed(origin.to_path_buf()))?;
    let mut records = HashMap::with_capacity(table.tracks.len());
    for row in table.tracks {
        let (hash, record) = row.into_entry();
        match records.entry(hash) {
            Entry::Occupied(_) => exn::bail!(ErrorKind::DuplicateEntry(format!("content hash {hash}"))),
            Entry::Vacant(slot) => {
                slot.insert(record);
            },
        }
    }
    unique_ids(records.values())?;
    Ok(records)
}

/// Fails on the first track id that appears on more than one record.
pub(crate) fn unique_ids<'a>(records: impl IntoIterator<Item = &'a TrackRecord>) -> Result<()> {
    let mut seen = HashSet::new();
    for record in records {
        if !seen.insert(record.id.as_str()) {
            exn::bail!(ErrorKind::DuplicateEntry(format!("track id {}", record.id)));
        }
    }
    Ok(())
}
