//! SQLite cache of content hashes.
//!
//! Hashing a track container means spawning `wszst` and reading the whole
//! file, so on large distributions a re-run spends most of its time redoing
//! work. The cache remembers, per source and relative path, which content hash
//! a file had at a given size and modification time.
//!
//! The cache is never the source of truth: a mismatch on size or mtime makes
//! the entry stale, and deleting the database file only costs a slower run.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::repo::{Lookup, Repository};
