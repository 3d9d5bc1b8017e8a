use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;

/// Look an executable up on `PATH`, unless it is already a path.
pub(crate) fn discover(program: &str) -> Result<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return match candidate.is_file() {
            true => Ok(candidate.to_path_buf()),
            false => exn::bail!(ErrorKind::ToolNotFound(program.to_string())),
        };
    }
    which::which(program).or_raise(|| ErrorKind::ToolNotFound(program.to_string()))
}

/// Run a program to completion and capture its output. A non-zero exit is
/// an error carrying the tool's stderr.
pub(crate) async fn run<I, S>(tool: &str, program: &Path, args: I) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command.args(args).kill_on_drop(true);
    tracing::trace!(tool, command = ?command.as_std(), "Running external tool");
    let output = command.output().await.or_raise(|| ErrorKind::Spawn(tool.to_string()))?;
    if !output.status.success() {
        exn::bail!(ErrorKind::ToolFailed {
            tool: tool.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}
