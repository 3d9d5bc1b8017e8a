//! Writing a finished run into the pack's output directory.

use crate::error::{ErrorKind, Result};
use crate::report::RunReport;
use ctpack_config::ManifestFormat;
use ctpack_storage::StorageBackend;
use exn::ResultExt;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::instrument;

pub const UNRESOLVED_FILE: &str = "unresolved.txt";
pub const FAILURES_FILE: &str = "failures.txt";

/// Write the manifest, the unresolved log and the failure log.
///
/// All three are always written, even when empty, so a directory never mixes
/// logs from different runs. Returns the paths written.
#[instrument(skip_all, fields(backend = output.name(), format = %format))]
pub async fn write_outputs(output: &dyn StorageBackend, report: &RunReport, format: ManifestFormat) -> Result<Vec<PathBuf>> {
    let manifest = match format {
        ManifestFormat::Ini => report.manifest.ini().to_string(),
        ManifestFormat::Json => report.manifest.to_json()?,
    };
    let files = [
        (format.file_name(), manifest),
        (UNRESOLVED_FILE, unresolved_log(report)),
        (FAILURES_FILE, failure_log(report)),
    ];
    let mut written = Vec::with_capacity(files.len());
    for (name, contents) in files {
        let path = Path::new(name);
        output.write(path, contents.as_bytes()).await.or_raise(|| ErrorKind::Output(name.to_string()))?;
        written.push(path.to_path_buf());
    }
    tracing::info!(tracks = report.manifest.len(), "Wrote pack manifest and logs");
    Ok(written)
}

/// `<path>\t<sha1>` per unresolved file, in scan order.
pub fn unresolved_log(report: &RunReport) -> String {
    report.unresolved.iter().fold(String::new(), |mut out, entry| {
        let _ = writeln!(out, "{}\t{}", entry.path.display(), entry.content_hash);
        out
    })
}

/// `<kind>\t<path>\t<track id>\t<reason>` per failure; hash failures use the
/// kind `hash` and no track id.
pub fn failure_log(report: &RunReport) -> String {
    let mut out = String::new();
    for failure in &report.scan_failures {
        let _ = writeln!(out, "hash\t{}\t-\t{}", failure.path.display(), one_line(&failure.reason));
    }
    for failure in &report.job_failures {
        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{}",
            failure.kind,
            failure.path.display(),
            failure.track_id,
            one_line(&failure.reason)
        );
    }
    out
}

/// Tool output can span lines; the log is one record per line.
fn one_line(reason: &str) -> String {
    reason.split_whitespace().collect::<Vec<_>>().join(" ")
}
