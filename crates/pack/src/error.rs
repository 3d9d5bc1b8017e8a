//! Pack Error Types
//!
//! Per-file and per-job problems (a container `wszst` can't hash, a failed
//! recompress, a missing thumbnail) are *recorded*, not raised; see
//! [`RunReport`](crate::RunReport). The errors here are the ones that stop a
//! run, plus the error type job and hasher implementations return.

use ctpack_tools::error::Error as ToolError;
use derive_more::{Display, Error};

/// A pack error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for pack operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// An input directory couldn't be listed.
    #[display("could not enumerate input `{_0}`")]
    Enumerate(#[error(not(source))] String),
    /// An external tool failed; carries the tool's own message.
    #[display("{_0}")]
    Tool(#[error(not(source))] String),
    /// The hash cache couldn't be read or updated.
    Cache,
    /// The output directory couldn't be written.
    #[display("could not write `{_0}`")]
    Output(#[error(not(source))] String),
    /// The manifest couldn't be serialized.
    Render,
    /// The run was cancelled before the job could start.
    Cancelled,
}
impl ErrorKind {
    /// Wrap an external tool error, keeping its message at this level so it
    /// can be written to the failure log on a single line.
    #[track_caller]
    pub fn tool(err: ToolError) -> Error {
        let reason = (*err).to_string();
        err.raise(ErrorKind::Tool(reason))
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Cache | Self::Output(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctpack_tools::error::ErrorKind as ToolErrorKind;

    #[test]
    fn test_tool_keeps_message() {
        let inner: ToolError = ToolErrorKind::ToolNotFound("wszst".to_string()).into();
        let err = ErrorKind::tool(inner);
        assert!(matches!(&*err, ErrorKind::Tool(reason) if reason.contains("wszst")));
    }
}
