//! Tool Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A tool error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for external tool operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required executable isn't installed (or isn't on `PATH`).
    #[display("{_0} not found on your system")]
    ToolNotFound(#[error(not(source))] String),
    /// The process couldn't be started at all.
    #[display("could not run {_0}")]
    Spawn(#[error(not(source))] String),
    /// The process ran and exited unsuccessfully. A missing exit code means
    /// it was killed by a signal.
    #[display("{tool} exited with {}: {stderr}", code.map_or_else(|| "a signal".to_string(), |c| format!("code {c}")))]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },
    /// The process succeeded but printed something we can't interpret.
    #[display("unexpected output from {tool}: {output}")]
    MalformedOutput { tool: String, output: String },
    #[display("I/O error on {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// The blob isn't laid out as whole cipher blocks.
    #[display("could not decrypt {}", _0.display())]
    Decrypt(#[error(not(source))] PathBuf),
    /// The HTTP request couldn't be completed (DNS, connect, timeout).
    #[display("request to {_0} failed")]
    Network(#[error(not(source))] String),
    #[display("request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },
    /// Image bytes couldn't be decoded or re-encoded.
    #[display("could not process image {_0}")]
    Image(#[error(not(source))] String),
    /// A blocking task panicked or was cancelled.
    #[display("background task failed")]
    Task,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Io(_) => true,
            Self::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
