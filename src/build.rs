//! `ctpack build`: prepare the sources, run the pipeline, write the outputs.

use crate::data;
use crate::error::{ErrorKind, Result};
use ctpack_cache::{Database, Repository};
use ctpack_config::{Config, VolumeConfig};
use ctpack_pack::{FAILURES_FILE, PackInfo, Pipeline, RunReport, UNRESOLVED_FILE, default_concurrency, write_outputs};
use ctpack_storage::BackendHandle;
use ctpack_storage::backend::{LocalBackend, ReadOnlyBackend};
use ctpack_tools::{Decrypter, Mount, ThumbnailFetcher, ThumbnailSettings, Wszst};
use exn::ResultExt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Build the pack described by `config`. Returns the finished report; its
/// `cancelled` flag tells the caller whether the run was interrupted.
#[instrument(skip_all, fields(output = %config.output.dir.display()))]
pub async fn run(config: &Config) -> Result<RunReport> {
    config.require_sources().or_raise(|| ErrorKind::Config)?;
    let resolver = Arc::new(data::resolver(&config.data)?);
    let crs1 = data::crs1(&config.data).await?;
    // Without it nothing can be hashed; fail before touching the volume.
    let wszst = Arc::new(Wszst::at(&config.wszst).or_raise(|| ErrorKind::Tool)?);

    let output_dir = absolute(&config.output.dir).or_raise(|| ErrorKind::Output(config.output.dir.clone()))?;
    let output: BackendHandle = Arc::new(
        LocalBackend::new("output", &output_dir).or_raise(|| ErrorKind::Output(config.output.dir.clone()))?,
    );

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_interrupt(cancel.clone()));

    let mount = match &config.volume {
        Some(volume) => Some(prepare_volume(volume).await?),
        None => None,
    };
    let courses = match (&mount, &config.volume) {
        (Some(mount), Some(volume)) => Some(mount.point().join(&volume.courses)),
        _ => None,
    };
    let sources = courses.iter().chain(&config.inputs).map(|dir| source(dir)).collect::<Result<Vec<_>>>()?;

    let cache = open_cache(config).await;
    let mut pipeline = Pipeline::new(resolver, wszst.clone(), output.clone(), pack_info(config))
        .with_concurrency(concurrency(config))
        .with_cancellation(cancel.clone());
    if config.jobs.recompress {
        pipeline = pipeline.with_recompressor(wszst.clone());
    }
    if config.jobs.thumbnails {
        let fetcher = ThumbnailFetcher::new(thumbnail_settings(config)).or_raise(|| ErrorKind::Thumbnails)?;
        pipeline = pipeline.with_thumbnails(Arc::new(fetcher));
    }
    if let Some(db) = &cache {
        pipeline = pipeline.with_cache(Repository::from(db));
    }
    if let Some(table) = crs1 {
        pipeline = pipeline.with_crs1(Arc::new(table));
    }

    let report = pipeline.run(&sources).await;
    if let Some(mount) = mount
        && let Err(err) = mount.detach().await
    {
        let reason = (*err).to_string();
        tracing::warn!(error = %reason, "Could not unmount the distribution volume");
    }
    let report = report.or_raise(|| ErrorKind::Pack)?;

    write_outputs(output.as_ref(), &report, config.output.format).await.or_raise(|| ErrorKind::Write)?;
    if let Some(db) = cache {
        db.close().await;
    }
    watcher.abort();

    tracing::info!(
        race = report.manifest.race_tracks.len(),
        battle = report.manifest.battle_tracks.len(),
        unresolved = report.unresolved.len(),
        duplicates = report.duplicates,
        hash_failures = report.scan_failures.len(),
        job_failures = report.job_failures.len(),
        output = %output_dir.display(),
        "Pack built"
    );
    if !report.is_clean() {
        tracing::warn!(
            unresolved = UNRESOLVED_FILE,
            failures = FAILURES_FILE,
            "Not every track container made it into the pack"
        );
    }
    Ok(report)
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::warn!("Interrupted; finishing running jobs before writing outputs");
            cancel.cancel();
        },
        Err(error) => tracing::warn!(%error, "Could not listen for Ctrl-C"),
    }
}

/// Decrypt the blob unless the image is already there, then mount it.
async fn prepare_volume(volume: &VolumeConfig) -> Result<Mount> {
    let present = tokio::fs::try_exists(&volume.image).await.or_raise(|| ErrorKind::Volume)?;
    if present {
        tracing::info!(image = %volume.image.display(), "Using existing decrypted volume");
    } else {
        let decrypter = match &volume.decrypt {
            Some(command) => Decrypter::command(&command.program, &command.args).or_raise(|| ErrorKind::Volume)?,
            None => Decrypter::Builtin,
        };
        decrypter.decrypt(&volume.blob, &volume.image).await.or_raise(|| ErrorKind::Volume)?;
    }
    Mount::attach(&volume.image, &volume.mount_point).await.or_raise(|| ErrorKind::Volume)
}

/// A read-only input named after its absolute path, which is also the key
/// its cached hashes are stored under.
fn source(dir: &Path) -> Result<BackendHandle> {
    let root = absolute(dir).or_raise(|| ErrorKind::Input(dir.to_path_buf()))?;
    let local = LocalBackend::existing(root.display().to_string(), &root).or_raise(|| ErrorKind::Input(dir.to_path_buf()))?;
    Ok(Arc::new(ReadOnlyBackend::new(Arc::new(local))))
}

fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    std::path::absolute(path)
}

/// A cache that can't be opened costs time, not correctness.
async fn open_cache(config: &Config) -> Option<Database> {
    let path = config.cache.resolved_path()?;
    if let Some(parent) = path.parent()
        && let Err(error) = tokio::fs::create_dir_all(parent).await
    {
        tracing::warn!(path = %path.display(), %error, "Could not create the cache directory; hashing everything");
        return None;
    }
    match Database::connect(&path).await {
        Ok(db) => Some(db),
        Err(err) => {
            let reason = (*err).to_string();
            tracing::warn!(path = %path.display(), error = %reason, "Could not open the hash cache; hashing everything");
            None
        },
    }
}

fn concurrency(config: &Config) -> NonZeroUsize {
    config.jobs.concurrency.and_then(NonZeroUsize::new).unwrap_or_else(default_concurrency)
}

fn pack_info(config: &Config) -> PackInfo {
    PackInfo {
        name: config.pack.name.clone(),
        author: config.pack.author.clone(),
        description: config.pack.description.clone(),
    }
}

fn thumbnail_settings(config: &Config) -> ThumbnailSettings {
    let thumbnails = &config.thumbnails;
    ThumbnailSettings {
        url_template: thumbnails.url_template.clone(),
        width: thumbnails.width,
        height: thumbnails.height,
        timeout: Duration::from_secs(thumbnails.timeout_secs),
        backup_dir: thumbnails.backup_dir.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[tokio::test]
    async fn test_requires_a_source() {
        let err = run(&Config::default()).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_missing_wszst_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let tracks = dir.path().join("tracks.toml");
        std::fs::write(&tracks, "").unwrap();
        let mut config = Config::default();
        config.inputs = vec![dir.path().to_path_buf()];
        config.data.tracks = tracks;
        config.wszst = "/nonexistent/bin/wszst".to_string();
        config.output.dir = dir.path().join("out");

        let err = run(&config).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Tool);
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_source_is_named_by_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let backend = source(dir.path()).unwrap();
        assert_eq!(backend.name(), dir.path().display().to_string());
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let err = source(Path::new("/nonexistent/tracks")).err().unwrap();
        assert_eq!(*err, ErrorKind::Input(PathBuf::from("/nonexistent/tracks")));
    }

    #[rstest]
    #[case(Some(3), 3)]
    #[case(Some(0), default_concurrency().get())]
    #[case(None, default_concurrency().get())]
    fn test_concurrency(#[case] configured: Option<usize>, #[case] expected: usize) {
        let mut config = Config::default();
        config.jobs.concurrency = configured;
        assert_eq!(concurrency(&config).get(), expected);
    }

    #[test]
    fn test_thumbnail_settings() {
        let mut config = Config::default();
        config.thumbnails.timeout_secs = 5;
        config.thumbnails.backup_dir = Some(PathBuf::from("backup"));
        let settings = thumbnail_settings(&config);
        assert_eq!(settings.timeout, Duration::from_secs(5));
        assert_eq!(settings.backup_dir, Some(PathBuf::from("backup")));
        assert_eq!(settings.width, 256);
    }
}
