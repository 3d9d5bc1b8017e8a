//! Reader for `CRS1` course tables.
//!
//! A CRS1 table lists, for every custom race course in a distribution, the
//! display name, the file name (without extension) of its track container,
//! and the music and course slots it occupies. It's a fixed-layout,
//! big-endian format:
//!
//! ```text
//! header (0x40 bytes)
//!   [0x00..0x04] magic         b"CRS1"
//!   [0x04..0x08] length        u32 (ignored)
//!   [0x08..0x0C] version       u32 = 0
//!   [0x0C..0x10] race count    u32
//!   [0x10..0x14] battle count  u32
//!   [0x14..0x40] reserved
//! race entry (0x100 bytes, repeated race count times)
//!   [0x00..0x80] course name   NUL-padded ASCII
//!   [0x80..0xC0] file name     NUL-padded ASCII, may be wrapped in 0x05
//!   [0xC0..0xC4] music slot    u32
//!   [0xC4..0xC8] course slot   u32
//!   [0xC8..0x100] reserved
//! ```

pub mod error;
mod reader;

use crate::error::{ErrorKind, Result};
use crate::reader::Reader;
use std::collections::HashMap;
use tracing::instrument;

pub const MAGIC: &[u8; 4] = b"CRS1";
pub const HEADER_SIZE: usize = 0x40;
pub const ENTRY_SIZE: usize = 0x100;
const NAME_SIZE: usize = 0x80;
const FILE_NAME_SIZE: usize = 0x40;

/// One race course described by the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crs1Entry {
    pub name: String,
    pub file_name: String,
    pub music_slot: u32,
    pub slot_id: u32,
}

/// A parsed CRS1 table, indexed by file stem (case-insensitive).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Crs1Table {
    pub battle_count: u32,
    entries: HashMap<String, Crs1Entry>,
}
impl Crs1Table {
    /// Looks up an entry by the stem of its track container's file name.
    pub fn get(&self, file_stem: &str) -> Option<&Crs1Entry> {
        self.entries.get(&file_stem.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parses a CRS1 table from raw bytes.
///
/// Only race entries are read; battle arenas aren't described by the table.
/// When two entries share a file name the later one wins.
#[instrument(skip(bytes), fields(size = bytes.len()))]
pub fn parse(bytes: &[u8]) -> Result<Crs1Table> {
    let mut reader = Reader::new(bytes);
    if reader.take(MAGIC.len())? != MAGIC {
        exn::bail!(ErrorKind::BadMagic);
    }
    reader.skip(4)?;
    let version = reader.u32()?;
    if version != 0 {
        exn::bail!(ErrorKind::UnsupportedVersion(version));
    }
    let race_count = reader.u32()?;
    let battle_count = reader.u32()?;
    reader.skip(HEADER_SIZE - reader.position())?;

    let mut entries = HashMap::new();
    for _ in 0..race_count {
        let entry = Crs1Entry {
            name: reader.fixed_str("course name", NAME_SIZE, &[])?,
            file_name: reader.fixed_str("file name", FILE_NAME_SIZE, &[0x05])?,
            music_slot: reader.u32()?,
            slot_id: reader.u32()?,
        };
        reader.skip(ENTRY_SIZE - NAME_SIZE - FILE_NAME_SIZE - 8)?;
        entries.insert(entry.file_name.to_lowercase(), entry);
    }
    tracing::debug!(race_count, battle_count, unique = entries.len(), "Parsed CRS1 table");
    Ok(Crs1Table { battle_count, entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn header(version: u32, races: u32) -> Vec<u8> {
        let mut buf = Vec::from(*MAGIC);
        buf.extend(0u32.to_be_bytes());
        buf.extend(version.to_be_bytes());
        buf.extend(races.to_be_bytes());
        buf.extend(2u32.to_be_bytes());
        buf.resize(HEADER_SIZE, 0);
        buf
    }

    fn entry(name: &str, file: &[u8], music: u32, slot: u32) -> Vec<u8> {
        let mut buf = vec![0; ENTRY_SIZE];
        buf[..name.len()].copy_from_slice(name.as_bytes());
        buf[NAME_SIZE..NAME_SIZE + file.len()].copy_from_slice(file);
        buf[0xC0..0xC4].copy_from_slice(&music.to_be_bytes());
        buf[0xC4..0xC8].copy_from_slice(&slot.to_be_bytes());
        buf
    }

    #[test]
    fn test_parse() {
        let mut buf = header(0, 2);
        buf.extend(entry("Star Slope", b"\x05STAR_SLOPE\x05", 0x75, 0x00));
        buf.extend(entry("Jungle Jamble", b"jungle_jamble", 0x8a, 0x1b));
        let table = parse(&buf).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.battle_count, 2);
        assert_eq!(
            table.get("star_slope"),
            Some(&Crs1Entry {
                name: "Star Slope".to_string(),
                file_name: "STAR_SLOPE".to_string(),
                music_slot: 0x75,
                slot_id: 0x00,
            })
        );
        assert_eq!(table.get("JUNGLE_JAMBLE").unwrap().slot_id, 0x1b);
    }

    #[test]
    fn test_parse_empty_table() {
        assert!(parse(&header(0, 0)).unwrap().is_empty());
    }

    #[rstest]
    #[case::magic({ let mut b = header(0, 0); b[0] = b'X'; b }, ErrorKind::BadMagic)]
    #[case::version(header(3, 0), ErrorKind::UnsupportedVersion(3))]
    #[case::short_header(header(0, 0)[..0x20].to_vec(), ErrorKind::Truncated(0x14))]
    #[case::missing_entries(header(0, 1), ErrorKind::Truncated(HEADER_SIZE))]
    fn test_parse_invalid(#[case] buf: Vec<u8>, #[case] expected: ErrorKind) {
        assert_eq!(*parse(&buf).unwrap_err(), expected);
    }
}
