//! Identity Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An identity error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for identity operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A content hash was not 40 hexadecimal characters.
    #[display("invalid content hash: {_0}")]
    InvalidHash(#[error(not(source))] String),
    /// A category was neither `race` nor `battle`.
    #[display("unknown track category: {_0}")]
    InvalidCategory(#[error(not(source))] String),
    /// A content hash or track id is claimed by more than one track.
    #[display("duplicate {_0}")]
    DuplicateEntry(#[error(not(source))] String),
    /// A static data file could not be read.
    #[display("could not read {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// A static data file was read but is not valid.
    #[display("malformed data in {}", _0.display())]
    Malformed(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Static data is either valid or it isn't.
        matches!(self, Self::Io(_))
    }
}
