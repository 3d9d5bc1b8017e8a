use crate::jobs::JobKind;
use crate::manifest::{PackManifest, UnresolvedEntry};
use crate::scheduler::{JobOutcome, JobStatus};
use serde::Serialize;
use std::path::PathBuf;

/// A side-effect job that didn't succeed. The track stays in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    pub kind: JobKind,
    pub path: PathBuf,
    pub track_id: String,
    pub reason: String,
}
impl JobFailure {
    /// `None` for jobs that succeeded or never ran.
    pub fn from_outcome(outcome: JobOutcome) -> Option<Self> {
        let reason = match outcome.status {
            JobStatus::Failed(reason) => reason,
            JobStatus::Panicked(reason) => format!("panicked: {reason}"),
            JobStatus::Succeeded | JobStatus::Cancelled => return None,
        };
        let label = outcome.label;
        Some(Self { kind: label.kind, path: label.path, track_id: label.track_id, reason })
    }
}

/// A file that couldn't be hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub manifest: PackManifest,
    /// In scan order.
    pub unresolved: Vec<UnresolvedEntry>,
    /// Files skipped because their identity was already admitted.
    pub duplicates: usize,
    /// In scan order.
    pub scan_failures: Vec<ScanFailure>,
    /// Sorted by path, then job kind.
    pub job_failures: Vec<JobFailure>,
    pub jobs_succeeded: usize,
    pub jobs_cancelled: usize,
    /// The run was interrupted; the manifest covers only the files seen
    /// before that.
    pub cancelled: bool,
}
impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty() && self.scan_failures.is_empty() && self.job_failures.is_empty() && !self.cancelled
    }
}
