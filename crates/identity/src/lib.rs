//! Track identity for custom track packs.
//!
//! Every track container is identified by the SHA-1 of its normalized
//! contents ([`ContentHash`]). This crate holds the static sources that turn
//! such a hash into track metadata, and the [`Resolver`] that combines them:
//!
//! 1. the [`TrackDatabase`] of published tracks,
//! 2. the [`AliasGraph`] of redirects for renamed or re-released content,
//! 3. the [`OverrideTable`] of hand-curated, never-published tracks.
//!
//! All three are loaded once (from TOML) and are read-only afterwards.

mod alias;
mod database;
pub mod error;
mod hash;
mod overrides;
mod record;
mod resolver;
mod table;

pub use crate::alias::AliasGraph;
pub use crate::database::TrackDatabase;
pub use crate::hash::ContentHash;
pub use crate::overrides::OverrideTable;
pub use crate::record::{Category, TrackRecord};
pub use crate::resolver::{Resolution, Resolver};
