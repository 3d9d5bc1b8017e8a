//! The pack manifest and the builder that assembles it.
//!
//! Tracks arrive at the builder in whatever order hashing and resolution
//! happen to finish, each tagged with the scan-sequence index its file
//! received at enumeration. [`ManifestBuilder::finalize`] sorts by that index,
//! so the manifest always lists tracks in scan order.

use crate::error::{ErrorKind, Result};
use ctpack_identity::{Category, ContentHash, TrackRecord};
use exn::ResultExt;
use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

/// Position a file received at enumeration time.
pub type Sequence = u64;

/// A scanned file whose identity was resolved and admitted to the pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTrack {
    /// Canonical hash: the database key the record was found under.
    pub content_hash: ContentHash,
    /// The scanned file's own hash; differs from `content_hash` when the
    /// track was found through an alias.
    pub source_hash: ContentHash,
    pub category: Category,
    pub record: TrackRecord,
    pub is_override: bool,
}
impl ResolvedTrack {
    pub fn id(&self) -> &str {
        &self.record.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackInfo {
    pub name: String,
    pub author: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackManifest {
    pub pack: PackInfo,
    pub race_tracks: Vec<ResolvedTrack>,
    pub battle_tracks: Vec<ResolvedTrack>,
}
impl PackManifest {
    /// All tracks, race tracks first.
    pub fn tracks(&self) -> impl Iterator<Item = &ResolvedTrack> {
        self.race_tracks.iter().chain(&self.battle_tracks)
    }

    pub fn len(&self) -> usize {
        self.race_tracks.len() + self.battle_tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// INI rendering, one `[Pack Info]` section followed by a section per
    /// track.
    pub fn ini(&self) -> Ini<'_> {
        Ini(self)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).or_raise(|| ErrorKind::Render)
    }
}

/// A file that hashed fine but that nothing could identify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedEntry {
    pub path: PathBuf,
    pub content_hash: ContentHash,
}

/// Accumulates admitted tracks and unresolved files.
///
/// Owned by a single writer (the pipeline); nothing here is shared.
#[derive(Debug)]
pub struct ManifestBuilder {
    pack: PackInfo,
    race: Vec<(Sequence, ResolvedTrack)>,
    battle: Vec<(Sequence, ResolvedTrack)>,
    unresolved: Vec<(Sequence, UnresolvedEntry)>,
}
impl ManifestBuilder {
    pub fn new(pack: PackInfo) -> Self {
        Self { pack, race: Vec::new(), battle: Vec::new(), unresolved: Vec::new() }
    }

    /// Add a track to the list for its own category.
    pub fn append(&mut self, seq: Sequence, track: ResolvedTrack) {
        match track.category {
            Category::Race => self.race.push((seq, track)),
            Category::Battle => self.battle.push((seq, track)),
        }
    }

    pub fn record_unresolved(&mut self, seq: Sequence, entry: UnresolvedEntry) {
        self.unresolved.push((seq, entry));
    }

    pub fn len(&self) -> usize {
        self.race.len() + self.battle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn finalize(self) -> (PackManifest, Vec<UnresolvedEntry>) {
        let manifest = PackManifest {
            pack: self.pack,
            race_tracks: in_sequence(self.race),
            battle_tracks: in_sequence(self.battle),
        };
        (manifest, in_sequence(self.unresolved))
    }
}

fn in_sequence<T>(mut items: Vec<(Sequence, T)>) -> Vec<T> {
    // Stable, so equal indices (which enumeration never hands out) keep
    // insertion order.
    items.sort_by_key(|(seq, _)| *seq);
    items.into_iter().map(|(_, item)| item).collect()
}

/// [`Display`] adapter writing a [`PackManifest`] as INI.
pub struct Ini<'a>(&'a PackManifest);
impl Display for Ini<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let manifest = self.0;
        let ids = |tracks: &[ResolvedTrack]| tracks.iter().map(ResolvedTrack::id).collect::<Vec<_>>().join(",");
        writeln!(f, "[Pack Info]")?;
        writeln!(f, "name = {}", manifest.pack.name)?;
        writeln!(f, "author = {}", manifest.pack.author)?;
        writeln!(f, "description = {}", manifest.pack.description)?;
        writeln!(f, "race = {}", ids(&manifest.race_tracks))?;
        writeln!(f, "battle = {}", ids(&manifest.battle_tracks))?;
        for track in manifest.tracks() {
            writeln!(f)?;
            writeln!(f, "[{}]", track.id())?;
            writeln!(f, "name = {}", track.record.name)?;
            writeln!(f, "category = {}", track.category)?;
            writeln!(f, "slot = {}", track.record.slot)?;
            if let Some(music_slot) = track.record.music_slot {
                writeln!(f, "music_slot = {music_slot}")?;
            }
            writeln!(f, "sha1 = {}", track.content_hash)?;
            if track.is_override {
                writeln!(f, "override = true")?;
            }
        }
        Ok(())
    }
}
