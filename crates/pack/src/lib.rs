//! Pack assembly.
//!
//! A run takes every track container from the configured inputs, hashes it,
//! resolves the hash to a track identity, keeps the first occurrence of each
//! identity per category, and assembles the survivors into a
//! [`PackManifest`]. Each admitted track also gets side-effect jobs
//! (recompression into the output tree, a thumbnail) that run concurrently on
//! a [`Scheduler`] and whose failures are recorded without affecting the
//! manifest.
//!
//! The primary entry point is [`Pipeline::run`]; the finished [`RunReport`]
//! is written out with [`write_outputs`].

mod dedup;
pub mod error;
mod jobs;
mod manifest;
mod output;
mod pipeline;
mod report;
mod scan;
mod scheduler;

pub use crate::dedup::Deduplicator;
pub use crate::jobs::{ContentHasher, JobKind, Recompressor, ThumbnailSource};
pub use crate::manifest::{Ini, ManifestBuilder, PackInfo, PackManifest, ResolvedTrack, Sequence, UnresolvedEntry};
pub use crate::output::{FAILURES_FILE, UNRESOLVED_FILE, failure_log, unresolved_log, write_outputs};
pub use crate::pipeline::{Pipeline, THUMBNAILS_DIR, TRACKS_DIR};
pub use crate::report::{JobFailure, RunReport, ScanFailure};
pub use crate::scan::{ScanEffort, ScanEvent, ScannedFile, scan, scan_file};
pub use crate::scheduler::{JobLabel, JobOutcome, JobStatus, Scheduler, default_concurrency};
