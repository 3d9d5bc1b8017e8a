//! Track preview thumbnails.
//!
//! Published tracks have a full-size preview on the custom track archive,
//! addressed by their numeric track id padded to five digits. Unpublished
//! tracks (and anything the archive doesn't have) can be covered by a local
//! backup directory of `<sha1>.jpg` / `<sha1>.png` images.

use crate::error::{ErrorKind, Result};
use ctpack_identity::ContentHash;
use exn::ResultExt;
use image::ImageFormat;
use image::imageops::FilterType;
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;

pub const DEFAULT_URL_TEMPLATE: &str = "http://archive.tock.eu/fullpreview/{bucket}/{id}.jpg";
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const BACKUP_EXTENSIONS: [&str; 2] = ["jpg", "png"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailSettings {
    /// `{id}` is replaced by the padded track id, `{bucket}` by its last two
    /// digits.
    pub url_template: String,
    pub width: u32,
    pub height: u32,
    pub timeout: Duration,
    pub backup_dir: Option<PathBuf>,
}
impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            width: 256,
            height: 144,
            timeout: Duration::from_secs(30),
            backup_dir: None,
        }
    }
}

/// How a thumbnail request was satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailOutcome {
    /// The destination already existed.
    AlreadyPresent,
    Downloaded,
    FromBackup(PathBuf),
    /// Neither the archive nor the backup directory has an image. Not an
    /// error: plenty of tracks never had a preview.
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct ThumbnailFetcher {
    client: reqwest::Client,
    settings: ThumbnailSettings,
}
impl ThumbnailFetcher {
    pub fn new(settings: ThumbnailSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .or_raise(|| ErrorKind::Network("client initialization".to_string()))?;
        Ok(Self { client, settings })
    }

    /// File name thumbnails are stored under: the padded id for numeric ids,
    /// the content hash otherwise.
    pub fn file_name(track_id: &str, hash: &ContentHash) -> String {
        match padded_id(track_id) {
            Some(id) => format!("{id}.jpg"),
            None => format!("{hash}.jpg"),
        }
    }

    #[instrument(skip_all, fields(track_id = %track_id, hash = %hash, destination = %destination.display()))]
    pub async fn fetch(&self, track_id: &str, hash: &ContentHash, destination: &Path) -> Result<ThumbnailOutcome> {
        if tokio::fs::try_exists(destination).await.or_raise(|| ErrorKind::Io(destination.to_path_buf()))? {
            return Ok(ThumbnailOutcome::AlreadyPresent);
        }
        if let Some(url) = self.url(track_id) {
            if let Some(bytes) = self.download(&url).await? {
                self.save(bytes, destination).await?;
                tracing::debug!(url = %url, "Downloaded thumbnail");
                return Ok(ThumbnailOutcome::Downloaded);
            }
            tracing::debug!(url = %url, "Thumbnail not in archive");
        }
        if let Some(backup) = self.backup(hash).await? {
            let bytes = tokio::fs::read(&backup).await.or_raise(|| ErrorKind::Io(backup.clone()))?;
            self.save(bytes, destination).await?;
            return Ok(ThumbnailOutcome::FromBackup(backup));
        }
        Ok(ThumbnailOutcome::Unavailable)
    }

    /// Archive URL for numeric track ids; `None` for anything else.
    fn url(&self, track_id: &str) -> Option<String> {
        let id = padded_id(track_id)?;
        let bucket = &id[id.len() - 2..];
        Some(self.settings.url_template.replace("{bucket}", bucket).replace("{id}", &id))
    }

    /// `Ok(None)` on 404.
    async fn download(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let response = self.client.get(url).send().await.or_raise(|| ErrorKind::Network(url.to_string()))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let bytes = response.bytes().await.or_raise(|| ErrorKind::Network(url.to_string()))?;
                Ok(Some(bytes.to_vec()))
            },
            status => exn::bail!(ErrorKind::HttpStatus { url: url.to_string(), status: status.as_u16() }),
        }
    }

    async fn backup(&self, hash: &ContentHash) -> Result<Option<PathBuf>> {
        let Some(dir) = &self.settings.backup_dir else {
            return Ok(None);
        };
        for ext in BACKUP_EXTENSIONS {
            let candidate = dir.join(format!("{hash}.{ext}"));
            if tokio::fs::try_exists(&candidate).await.or_raise(|| ErrorKind::Io(candidate.clone()))? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// Decode, resize and write as JPEG. Runs on the blocking pool; the
    /// output only appears at `destination` once fully written.
    async fn save(&self, bytes: Vec<u8>, destination: &Path) -> Result<()> {
        let (width, height) = (self.settings.width, self.settings.height);
        let destination = destination.to_path_buf();
        tokio::task::spawn_blocking(move || resize_into(&bytes, width, height, &destination))
            .await
            .or_raise(|| ErrorKind::Task)?
    }
}

fn padded_id(track_id: &str) -> Option<String> {
    let id: u32 = track_id.parse().ok()?;
    Some(format!("{id:05}"))
}

fn resize_into(bytes: &[u8], width: u32, height: u32, destination: &Path) -> Result<()> {
    let name = || ErrorKind::Image(destination.display().to_string());
    let image = image::load_from_memory(bytes).or_raise(name)?;
    let resized = image.resize_exact(width, height, FilterType::Triangle).to_rgb8();
    let parent = destination.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Io(parent.to_path_buf()))?;
    let mut staging = tempfile::Builder::new()
        .prefix(".ctpack-")
        .suffix(".jpg")
        .tempfile_in(parent)
        .or_raise(|| ErrorKind::Io(parent.to_path_buf()))?;
    resized.write_to(&mut staging, ImageFormat::Jpeg).or_raise(name)?;
    staging.persist(destination).or_raise(|| ErrorKind::Io(destination.to_path_buf()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};
    use rstest::rstest;
    use std::io::Cursor;

    const HASH: &str = "4f86672b7014baf1f496e36ecf0c55ac455bf329";

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255])).write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn fetcher(backup_dir: Option<PathBuf>) -> ThumbnailFetcher {
        // Nothing listens on the discard port; any request fails fast.
        let url_template = "http://127.0.0.1:9/{bucket}/{id}.jpg".to_string();
        ThumbnailFetcher::new(ThumbnailSettings { url_template, backup_dir, ..Default::default() }).unwrap()
    }

    #[rstest]
    #[case("3054", Some("http://archive.tock.eu/fullpreview/54/03054.jpg"))]
    #[case("12345", Some("http://archive.tock.eu/fullpreview/45/12345.jpg"))]
    #[case("7", Some("http://archive.tock.eu/fullpreview/07/00007.jpg"))]
    #[case(HASH, None)]
    #[case("", None)]
    fn test_url(#[case] track_id: &str, #[case] expected: Option<&str>) {
        let fetcher = ThumbnailFetcher::new(ThumbnailSettings::default()).unwrap();
        assert_eq!(fetcher.url(track_id).as_deref(), expected);
    }

    #[test]
    fn test_file_name() {
        let hash: ContentHash = HASH.parse().unwrap();
        assert_eq!(ThumbnailFetcher::file_name("3054", &hash), "03054.jpg");
        assert_eq!(ThumbnailFetcher::file_name(HASH, &hash), format!("{HASH}.jpg"));
    }

    #[test]
    fn test_resize_into() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("thumbnails/03054.jpg");
        resize_into(&png(640, 360), 256, 144, &destination).unwrap();
        let saved = image::open(&destination).unwrap();
        assert_eq!(saved.dimensions(), (256, 144));
        assert_eq!(std::fs::read_dir(dir.path().join("thumbnails")).unwrap().count(), 1);
    }

    #[test]
    fn test_resize_into_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("03054.jpg");
        let err = resize_into(b"<html>404</html>", 256, 144, &destination).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Image(_)));
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn test_already_present_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("03054.jpg");
        std::fs::write(&destination, b"existing").unwrap();
        let outcome = fetcher(None).fetch("3054", &HASH.parse().unwrap(), &destination).await.unwrap();
        assert_eq!(outcome, ThumbnailOutcome::AlreadyPresent);
        assert_eq!(std::fs::read(&destination).unwrap(), b"existing");
    }

    #[tokio::test]
    async fn test_backup_for_unpublished_track() {
        let dir = tempfile::tempdir().unwrap();
        let backup_dir = dir.path().join("backup");
        std::fs::create_dir(&backup_dir).unwrap();
        std::fs::write(backup_dir.join(format!("{HASH}.png")), png(512, 288)).unwrap();
        let destination = dir.path().join(format!("thumbnails/{HASH}.jpg"));
        let outcome = fetcher(Some(backup_dir.clone())).fetch(HASH, &HASH.parse().unwrap(), &destination).await.unwrap();
        assert_eq!(outcome, ThumbnailOutcome::FromBackup(backup_dir.join(format!("{HASH}.png"))));
        assert_eq!(image::open(&destination).unwrap().dimensions(), (256, 144));
    }

    #[tokio::test]
    async fn test_unavailable_without_backup() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("thumb.jpg");
        let outcome = fetcher(None).fetch(HASH, &HASH.parse().unwrap(), &destination).await.unwrap();
        assert_eq!(outcome, ThumbnailOutcome::Unavailable);
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn test_network_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("03054.jpg");
        let err = fetcher(None).fetch("3054", &HASH.parse().unwrap(), &destination).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Network(_)));
    }
}
