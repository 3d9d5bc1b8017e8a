//! CRS1 Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A CRS1 parsing error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for CRS1 parsing.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The buffer does not start with the `CRS1` magic.
    #[display("not a CRS1 table")]
    BadMagic,
    /// The table declares a version this reader doesn't understand.
    #[display("unsupported CRS1 version: {_0}")]
    UnsupportedVersion(#[error(not(source))] u32),
    /// The buffer ended before the declared number of entries was read.
    #[display("CRS1 table truncated at offset {_0:#x}")]
    Truncated(#[error(not(source))] usize),
    /// A field was found but could not be parsed.
    #[display("failed to parse field '{field}', found value: {value}")]
    ParseError {
        /// The field that failed to parse.
        field: &'static str,
        /// Details about the parsing failure.
        value: String,
    },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // The table is either valid or it isn't.
        false
    }
}
