//! Thin wrappers around everything the pack build delegates to the outside
//! world: the `wszst` utility, the distribution volume (decrypting and
//! mounting it), and the thumbnail archive.
//!
//! Nothing in here knows about track identity or pack policy; each wrapper
//! takes paths in and hands paths (or hashes) back.

pub mod error;
mod process;
mod thumbnail;
mod volume;
mod wszst;

pub use crate::thumbnail::{ThumbnailFetcher, ThumbnailOutcome, ThumbnailSettings};
pub use crate::volume::{Decrypter, Mount};
pub use crate::wszst::Wszst;
