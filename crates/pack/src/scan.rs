//! Enumerating and hashing the input track containers.

use crate::error::{Error, ErrorKind, Result};
use crate::jobs::ContentHasher;
use crate::manifest::Sequence;
use async_stream::stream;
use ctpack_cache::{Lookup, Repository};
use ctpack_identity::ContentHash;
use ctpack_storage::BackendHandle;
use ctpack_storage::file::FileInfo;
use exn::ResultExt;
use futures::{Stream, StreamExt};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tracing::instrument;

/// Track containers, whatever the case of their file names.
const EXTENSION: &str = "szs";

/// A track container found during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Scan-sequence index: the file's position across all inputs.
    pub seq: Sequence,
    /// Name of the input backend the file was listed from.
    pub source: String,
    pub file: FileInfo,
    /// Where the file lives on disk, for external tools.
    pub location: PathBuf,
}
impl ScannedFile {
    /// File name without extension, as used by course tables.
    pub fn stem(&self) -> Option<&str> {
        self.file.stem()
    }
}

/// Indicates how much work was required to hash a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEffort {
    /// The cache had a hash for this path, size and modification time.
    Cached,
    /// The cache had an entry but the file has changed since; rehashed.
    Recalculated,
    /// Not cached (or no cache); hashed.
    Processed,
}

/// Progress events emitted by [`scan`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete), exactly once, with the
///    total file count.
/// 3. [`Hashed`](Self::Hashed) or [`Failed`](Self::Failed), once per file
///    and in scan-sequence order.
/// 4. [`Complete`](Self::Complete), exactly once.
///
/// An enumeration error terminates the stream early, in which case
/// [`Complete`](Self::Complete) is never emitted. Per-file failures don't.
#[derive(Debug)]
pub enum ScanEvent {
    Started,
    DiscoveryComplete(u64),
    Hashed { file: ScannedFile, hash: ContentHash, effort: ScanEffort },
    Failed { file: ScannedFile, error: Error },
    Complete,
}

/// Streams [`ScanEvent`]s for every track container in `sources`.
///
/// Sources are listed in the order given, each sorted by path. Up to
/// `concurrency` files are hashed at once; results are still yielded in
/// enumeration order. Dropping the stream abandons any hashes in flight.
pub fn scan<'a>(
    sources: &'a [BackendHandle],
    hasher: &'a dyn ContentHasher,
    cache: Option<&'a Repository>,
    concurrency: NonZeroUsize,
) -> impl Stream<Item = Result<ScanEvent>> + 'a {
    stream!({
        yield Ok(ScanEvent::Started);

        let files = match discover(sources).await {
            Ok(files) => files,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        // Infallible: a usize (either 32- or 64-bit) will always fit in a u64.
        yield Ok(ScanEvent::DiscoveryComplete(u64::try_from(files.len()).unwrap_or(0)));

        let hashed = futures::stream::iter(files)
            .map(|file| scan_file(hasher, cache, file))
            .buffered(concurrency.get());
        for await event in hashed {
            yield Ok(event);
        }

        yield Ok(ScanEvent::Complete);
    })
}

async fn discover(sources: &[BackendHandle]) -> Result<Vec<ScannedFile>> {
    let mut found = Vec::new();
    for backend in sources {
        let enumerate = || ErrorKind::Enumerate(backend.name().to_string());
        let mut files = backend.list().await.or_raise(enumerate)?;
        files.retain(|file| file.has_extension(EXTENSION));
        files.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::info!(source = backend.name(), files = files.len(), "Discovered track containers");
        for file in files {
            let location = backend.locate(&file.path).await.or_raise(enumerate)?;
            let seq = u64::try_from(found.len()).unwrap_or(u64::MAX);
            found.push(ScannedFile { seq, source: backend.name().to_string(), file, location });
        }
    }
    Ok(found)
}

/// Hash a single file, consulting the cache first.
///
/// Cache problems are logged and otherwise ignored: the worst outcome of a
/// broken cache is a slower run.
#[instrument(skip_all, fields(seq = file.seq, path = %file.location.display()))]
pub async fn scan_file(hasher: &dyn ContentHasher, cache: Option<&Repository>, file: ScannedFile) -> ScanEvent {
    let effort = match cache {
        Some(cache) => match cache.lookup(&file.source, &file.file).await {
            Ok(Lookup::Fresh(hash)) => return ScanEvent::Hashed { file, hash, effort: ScanEffort::Cached },
            Ok(Lookup::Stale) => {
                tracing::info!("Cached file has changed on disk; recalculating");
                ScanEffort::Recalculated
            },
            Ok(Lookup::Miss) => ScanEffort::Processed,
            Err(error) => {
                tracing::warn!(error = ?error, "Hash cache lookup failed");
                ScanEffort::Processed
            },
        },
        None => ScanEffort::Processed,
    };
    let hash = match hasher.hash(&file.location).await {
        Ok(hash) => hash,
        Err(error) => {
            let reason = (*error).to_string();
            tracing::warn!(%reason, "Could not hash track container");
            if let (Some(cache), ScanEffort::Recalculated) = (cache, effort)
                && let Err(cleanup) = cache.delete_by_path(&file.source, &file.file.path).await
            {
                tracing::warn!(error = ?cleanup, "Could not drop stale hash cache entry");
            }
            return ScanEvent::Failed { file, error };
        },
    };
    if let Some(cache) = cache
        && let Err(error) = cache.upsert(&file.source, &file.file, &hash).await
    {
        tracing::warn!(error = ?error, "Could not update hash cache");
    }
    ScanEvent::Hashed { file, hash, effort }
}
