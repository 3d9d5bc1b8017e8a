//! A full pack run: scan, resolve, deduplicate, schedule jobs, assemble.

use crate::dedup::Deduplicator;
use crate::error::{ErrorKind, Result};
use crate::jobs::{ContentHasher, JobKind, Recompressor, ThumbnailSource};
use crate::manifest::{ManifestBuilder, PackInfo, ResolvedTrack, UnresolvedEntry};
use crate::report::{JobFailure, RunReport, ScanFailure};
use crate::scan::{ScanEvent, ScannedFile, scan};
use crate::scheduler::{self, JobLabel, JobStatus, Scheduler};
use ctpack_cache::Repository;
use ctpack_crs1::Crs1Table;
use ctpack_identity::{ContentHash, Resolution, Resolver, TrackRecord};
use ctpack_storage::BackendHandle;
use ctpack_tools::ThumbnailOutcome;
use exn::ResultExt;
use futures::StreamExt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Recompressed containers, relative to the output root.
pub const TRACKS_DIR: &str = "tracks";
/// Thumbnails, relative to the output root.
pub const THUMBNAILS_DIR: &str = "thumbnails";

/// Drives one pack run.
///
/// Static identity data is shared read-only; everything mutable (the dedup
/// set, the manifest builder, the job scheduler) is created per
/// [`run`](Self::run).
pub struct Pipeline {
    resolver: Arc<Resolver>,
    hasher: Arc<dyn ContentHasher>,
    output: BackendHandle,
    pack: PackInfo,
    recompressor: Option<Arc<dyn Recompressor>>,
    thumbnails: Option<Arc<dyn ThumbnailSource>>,
    cache: Option<Repository>,
    crs1: Option<Arc<Crs1Table>>,
    concurrency: NonZeroUsize,
    cancel: CancellationToken,
}
impl Pipeline {
    pub fn new(resolver: Arc<Resolver>, hasher: Arc<dyn ContentHasher>, output: BackendHandle, pack: PackInfo) -> Self {
        Self {
            resolver,
            hasher,
            output,
            pack,
            recompressor: None,
            thumbnails: None,
            cache: None,
            crs1: None,
            concurrency: scheduler::default_concurrency(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_recompressor(mut self, recompressor: Arc<dyn Recompressor>) -> Self {
        self.recompressor = Some(recompressor);
        self
    }

    pub fn with_thumbnails(mut self, thumbnails: Arc<dyn ThumbnailSource>) -> Self {
        self.thumbnails = Some(thumbnails);
        self
    }

    pub fn with_cache(mut self, cache: Repository) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Course table used to fill in music slots missing from override
    /// records.
    pub fn with_crs1(mut self, table: Arc<Crs1Table>) -> Self {
        self.crs1 = Some(table);
        self
    }

    /// Bounds both concurrent hashes and concurrent jobs.
    pub fn with_concurrency(mut self, concurrency: NonZeroUsize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Scan `sources` and assemble the pack.
    ///
    /// Only an enumeration failure is an error. Cancellation stops the scan;
    /// jobs already running are waited for and the report covers whatever was
    /// processed.
    #[instrument(skip_all, fields(sources = sources.len(), concurrency = self.concurrency.get()))]
    pub async fn run(&self, sources: &[BackendHandle]) -> Result<RunReport> {
        let mut run = Run {
            dedup: Deduplicator::new(),
            builder: ManifestBuilder::new(self.pack.clone()),
            scheduler: Scheduler::new(self.concurrency, self.cancel.clone()),
            duplicates: 0,
            scan_failures: Vec::new(),
        };
        let mut cancelled = false;
        {
            let mut events = std::pin::pin!(scan(sources, self.hasher.as_ref(), self.cache.as_ref(), self.concurrency));
            loop {
                let event = tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => {
                        tracing::warn!("Run cancelled; no further files will be processed");
                        cancelled = true;
                        break;
                    },
                    event = events.next() => event,
                };
                let Some(event) = event else {
                    break;
                };
                match event? {
                    ScanEvent::Started => tracing::debug!("Scan started"),
                    ScanEvent::DiscoveryComplete(total) => tracing::info!(total, "Hashing track containers"),
                    ScanEvent::Hashed { file, hash, effort } => {
                        tracing::debug!(seq = file.seq, path = %file.location.display(), %hash, ?effort, "Hashed");
                        self.process(&mut run, file, hash);
                    },
                    ScanEvent::Failed { file, error } => {
                        run.scan_failures.push(ScanFailure { path: file.location, reason: scheduler::reason(&error) });
                    },
                    ScanEvent::Complete => tracing::debug!("Scan complete"),
                }
            }
        }

        tracing::info!(jobs = run.scheduler.pending(), "Waiting for jobs to finish");
        let mut job_failures = Vec::new();
        let (mut jobs_succeeded, mut jobs_cancelled) = (0, 0);
        for outcome in run.scheduler.drain().await {
            match outcome.status {
                JobStatus::Succeeded => jobs_succeeded += 1,
                JobStatus::Cancelled => jobs_cancelled += 1,
                _ => job_failures.extend(JobFailure::from_outcome(outcome)),
            }
        }
        job_failures.sort_by(|a, b| (&a.path, a.kind).cmp(&(&b.path, b.kind)));

        let (manifest, unresolved) = run.builder.finalize();
        tracing::info!(
            race = manifest.race_tracks.len(),
            battle = manifest.battle_tracks.len(),
            unresolved = unresolved.len(),
            duplicates = run.duplicates,
            scan_failures = run.scan_failures.len(),
            job_failures = job_failures.len(),
            "Pack assembled"
        );
        Ok(RunReport {
            manifest,
            unresolved,
            duplicates: run.duplicates,
            scan_failures: run.scan_failures,
            job_failures,
            jobs_succeeded,
            jobs_cancelled,
            cancelled,
        })
    }

    /// Resolve, deduplicate, schedule and record a single hashed file.
    fn process(&self, run: &mut Run, file: ScannedFile, hash: ContentHash) {
        let track = match self.resolver.resolve(&hash) {
            Resolution::Known { hash: canonical, record } => ResolvedTrack {
                content_hash: canonical,
                source_hash: hash,
                category: record.category,
                record: record.clone(),
                is_override: false,
            },
            Resolution::Overridden(record) => {
                let record = self.enrich(record, &file);
                ResolvedTrack { content_hash: hash, source_hash: hash, category: record.category, record, is_override: true }
            },
            Resolution::Unresolved => {
                tracing::info!(path = %file.location.display(), %hash, "Unresolved track container");
                run.builder.record_unresolved(file.seq, UnresolvedEntry { path: file.location, content_hash: hash });
                return;
            },
        };
        if !run.dedup.admit(track.category, &track.content_hash) {
            tracing::info!(path = %file.location.display(), track_id = %track.id(), category = %track.category, "Skipping duplicate");
            run.duplicates += 1;
            return;
        }
        self.schedule(&mut run.scheduler, &file, &track);
        run.builder.append(file.seq, track);
    }

    /// Override records may lack a music slot; a course table entry for the
    /// same file fills it in. Produces a new record, never touching the
    /// table's.
    fn enrich(&self, record: &TrackRecord, file: &ScannedFile) -> TrackRecord {
        let record = record.clone();
        if record.music_slot.is_some() {
            return record;
        }
        let entry = self.crs1.as_deref().zip(file.stem()).and_then(|(table, stem)| table.get(stem));
        match entry {
            Some(entry) => {
                tracing::debug!(track_id = %record.id, music_slot = entry.music_slot, "Music slot from course table");
                record.with_music_slot(entry.music_slot)
            },
            None => record,
        }
    }

    fn schedule(&self, scheduler: &mut Scheduler, file: &ScannedFile, track: &ResolvedTrack) {
        if let Some(recompressor) = &self.recompressor {
            let recompressor = recompressor.clone();
            let output = self.output.clone();
            let source = file.location.clone();
            let destination = Path::new(TRACKS_DIR).join(format!("{}.szs", track.id()));
            scheduler.submit(JobLabel::new(JobKind::Recompress, &file.location, track.id()), async move {
                let destination = locate(&output, &destination).await?;
                recompressor.recompress(&source, &destination).await
            });
        }
        if let Some(thumbnails) = &self.thumbnails {
            let thumbnails = thumbnails.clone();
            let output = self.output.clone();
            let (track_id, hash) = (track.id().to_string(), track.content_hash);
            let destination = Path::new(THUMBNAILS_DIR).join(thumbnails.file_name(&track_id, &hash));
            scheduler.submit(JobLabel::new(JobKind::Thumbnail, &file.location, track.id()), async move {
                let destination = locate(&output, &destination).await?;
                match thumbnails.thumbnail(&track_id, &hash, &destination).await? {
                    ThumbnailOutcome::Unavailable => tracing::info!(%track_id, "No thumbnail available"),
                    outcome => tracing::debug!(%track_id, ?outcome, "Thumbnail ready"),
                }
                Ok(())
            });
        }
    }
}

/// Per-run mutable state, owned by [`Pipeline::run`].
struct Run {
    dedup: Deduplicator,
    builder: ManifestBuilder,
    scheduler: Scheduler,
    duplicates: usize,
    scan_failures: Vec<ScanFailure>,
}

async fn locate(output: &BackendHandle, path: &Path) -> Result<PathBuf> {
    output.locate(path).await.or_raise(|| ErrorKind::Output(path.display().to_string()))
}
