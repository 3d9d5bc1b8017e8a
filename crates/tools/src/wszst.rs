//! `wszst` from Wiimms SZS Toolset.
//!
//! Two subcommands are used:
//!
//! - `wszst sha1 <file>` prints the SHA-1 of the *decompressed* archive
//!   contents followed by the file name, so two containers that differ only
//!   in their compression hash the same.
//! - `wszst compress --overwrite --dest <dest> <file>` re-encodes a container.

use crate::error::{ErrorKind, Result};
use crate::process;
use ctpack_identity::ContentHash;
use exn::ResultExt;
use regex::Regex;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::instrument;

const TOOL: &str = "wszst";

static SHA1_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*([0-9a-fA-F]{40})(?:\s|$)").unwrap());

#[derive(Debug, Clone)]
pub struct Wszst {
    program: PathBuf,
}
impl Wszst {
    /// Use a specific executable, either a bare name looked up on `PATH` or a
    /// path to the binary.
    pub fn at(program: &str) -> Result<Self> {
        let program = process::discover(program)?;
        tracing::debug!(program = %program.display(), "Using wszst");
        Ok(Self { program })
    }

    /// Canonical content hash of a track container.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn sha1(&self, path: &Path) -> Result<ContentHash> {
        let output = process::run(TOOL, &self.program, [OsStr::new("sha1"), path.as_os_str()]).await?;
        parse_sha1(&String::from_utf8_lossy(&output.stdout))
    }

    /// Re-encode `source` into `destination`.
    ///
    /// The output is written next to `destination` under a temporary name and
    /// only renamed into place once `wszst` succeeds, so a failed or
    /// interrupted run never leaves a truncated container behind.
    #[instrument(skip_all, fields(source = %source.display(), destination = %destination.display()))]
    pub async fn compress(&self, source: &Path, destination: &Path) -> Result<()> {
        let parent = destination.parent().unwrap_or(Path::new("."));
        tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Io(parent.to_path_buf()))?;
        // wszst picks the output format from the extension.
        let staging = tempfile::Builder::new()
            .prefix(".ctpack-")
            .suffix(".szs")
            .tempfile_in(parent)
            .or_raise(|| ErrorKind::Io(parent.to_path_buf()))?;
        process::run(
            TOOL,
            &self.program,
            [
                OsStr::new("compress"),
                OsStr::new("--overwrite"),
                OsStr::new("--dest"),
                staging.path().as_os_str(),
                source.as_os_str(),
            ],
        )
        .await?;
        staging.persist(destination).or_raise(|| ErrorKind::Io(destination.to_path_buf()))?;
        Ok(())
    }
}

/// Extracts the hash from `wszst sha1` output: the first whitespace-separated
/// token of the first line must be 40 hex digits.
fn parse_sha1(stdout: &str) -> Result<ContentHash> {
    let malformed = || ErrorKind::MalformedOutput { tool: TOOL.to_string(), output: stdout.trim().to_string() };
    let line = stdout.lines().find(|line| !line.trim().is_empty()).unwrap_or_default();
    let captures = SHA1_LINE.captures(line).ok_or_else(malformed)?;
    captures[1].parse::<ContentHash>().or_raise(malformed)
}
