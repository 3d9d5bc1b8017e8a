use crate::error::{Error, ErrorKind};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Which cup list a track belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Race,
    Battle,
}
impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Race => "race",
            Category::Battle => "battle",
        }
    }
}
impl FromStr for Category {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "race" | "course" => Self::Race,
            "battle" | "arena" => Self::Battle,
            _ => exn::bail!(ErrorKind::InvalidCategory(s.to_string())),
        })
    }
}
impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|e: Error| D::Error::custom((*e).to_string()))
    }
}

/// Metadata for a single known track.
///
/// Loaded from the track database or the override table and never mutated
/// afterwards; enrichment produces a new record instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Opaque identifier. Numeric for database tracks (the archive's track
    /// number), the content hash for unreleased tracks.
    pub id: String,
    pub name: String,
    pub category: Category,
    /// Course slot the track replaces.
    pub slot: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_slot: Option<u32>,
}
impl TrackRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: Category, slot: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            slot,
            music_slot: None,
        }
    }

    pub fn with_music_slot(mut self, music_slot: impl Into<Option<u32>>) -> Self {
        self.music_slot = music_slot.into();
        self
    }

    /// The numeric archive identifier, if this record has one.
    pub fn numeric_id(&self) -> Option<u32> {
        self.id.trim().parse().ok()
    }
}
