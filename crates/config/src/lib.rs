//! Configuration for a pack build.
//!
//! Values are layered, later sources winning:
//!
//! 1. built-in defaults,
//! 2. a TOML, YAML or JSON file (`--config`, or `ctpack.{toml,yaml,yml,json}`
//!    in the platform configuration directory),
//! 3. `CTPACK_`-prefixed environment variables, with `__` separating nested
//!    keys (`CTPACK_OUTPUT__DIR=/srv/pack`),
//! 4. command-line overrides supplied by the caller.

pub mod error;
mod load;

pub use crate::load::{default_file, figment};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pack: PackConfig,
    pub data: DataConfig,
    /// Directories of loose track containers, scanned in the order given.
    pub inputs: Vec<PathBuf>,
    /// Encrypted distribution volume; its course directory is scanned before
    /// any `inputs`.
    pub volume: Option<VolumeConfig>,
    pub output: OutputConfig,
    pub jobs: JobsConfig,
    pub thumbnails: ThumbnailConfig,
    pub cache: CacheConfig,
    /// `wszst` executable name or path.
    pub wszst: String,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            pack: PackConfig::default(),
            data: DataConfig::default(),
            inputs: Vec::new(),
            volume: None,
            output: OutputConfig::default(),
            jobs: JobsConfig::default(),
            thumbnails: ThumbnailConfig::default(),
            cache: CacheConfig::default(),
            wszst: "wszst".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    pub name: String,
    pub author: String,
    pub description: String,
}
impl Default for PackConfig {
    fn default() -> Self {
        Self {
            name: "Custom Track Grand Prix".to_string(),
            author: "Mr Bean35000vr & Chadderz".to_string(),
            description: "A custom track pack for Mario Kart Wii".to_string(),
        }
    }
}

/// Static identity data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub tracks: PathBuf,
    pub aliases: Option<PathBuf>,
    pub overrides: Option<PathBuf>,
    /// CRS1 course table used to fill in music slots for overridden tracks.
    pub crs1: Option<PathBuf>,
}
impl Default for DataConfig {
    fn default() -> Self {
        Self { tracks: PathBuf::from("tracks.toml"), aliases: None, overrides: None, crs1: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Encrypted blob as shipped in the distribution.
    pub blob: PathBuf,
    /// Decrypted filesystem image; decryption is skipped if it exists.
    pub image: PathBuf,
    pub mount_point: PathBuf,
    /// Course directory relative to the mount point.
    pub courses: PathBuf,
    /// External decryption command; the blob is decrypted in-process when unset.
    pub decrypt: Option<DecryptConfig>,
}
impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            blob: PathBuf::from("in/blob.bin"),
            image: PathBuf::from("out/blob.dat"),
            mount_point: PathBuf::from("ctgp"),
            courses: PathBuf::from("PACKAGES/CTGPR/RACE/COURSE"),
            decrypt: None,
        }
    }
}

/// `{input}` and `{output}` in `args` are replaced with the blob and image
/// paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptConfig {
    pub program: String,
    #[serde(default = "DecryptConfig::default_args")]
    pub args: Vec<String>,
}
impl DecryptConfig {
    fn default_args() -> Vec<String> {
        vec!["{input}".to_string(), "{output}".to_string()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub format: ManifestFormat,
}
impl Default for OutputConfig {
    fn default() -> Self {
        Self { dir: PathBuf::from("out"), format: ManifestFormat::default() }
    }
}

#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestFormat {
    #[default]
    #[display("ini")]
    Ini,
    #[display("json")]
    Json,
}
impl ManifestFormat {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Ini => "manifest.ini",
            Self::Json => "manifest.json",
        }
    }
}
impl FromStr for ManifestFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ini" => Ok(Self::Ini),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown manifest format `{other}` (expected ini or json)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Upper bound on concurrent jobs and concurrent hashes. Defaults to the
    /// available parallelism.
    pub concurrency: Option<usize>,
    pub recompress: bool,
    pub thumbnails: bool,
}
impl Default for JobsConfig {
    fn default() -> Self {
        Self { concurrency: None, recompress: true, thumbnails: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    pub url_template: String,
    pub width: u32,
    pub height: u32,
    pub timeout_secs: u64,
    /// Directory of `<sha1>.jpg`/`<sha1>.png` fallbacks.
    pub backup_dir: Option<PathBuf>,
}
impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            url_template: "http://archive.tock.eu/fullpreview/{bucket}/{id}.jpg".to_string(),
            width: 256,
            height: 144,
            timeout_secs: 30,
            backup_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Defaults to `hashes.sqlite` in the platform cache directory.
    pub path: Option<PathBuf>,
}
impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true, path: None }
    }
}
impl CacheConfig {
    /// Where the cache database lives, if caching is enabled and a location
    /// can be determined.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        self.path.clone().or_else(|| load::project_dirs().map(|dirs| dirs.cache_dir().join("hashes.sqlite")))
    }
}
