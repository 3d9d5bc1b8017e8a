use crate::Config;
use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use std::path::{Path, PathBuf};
use tracing::instrument;

const FILE_STEM: &str = "ctpack";
const EXTENSIONS: [&str; 4] = ["toml", "yaml", "yml", "json"];
const ENV_PREFIX: &str = "CTPACK_";

pub(crate) fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", FILE_STEM)
}

/// First `ctpack.{toml,yaml,yml,json}` found in the platform configuration
/// directory.
pub fn default_file() -> Option<PathBuf> {
    let dirs = project_dirs()?;
    find_in(dirs.config_dir())
}

fn find_in(dir: &Path) -> Option<PathBuf> {
    EXTENSIONS.iter().map(|ext| dir.join(format!("{FILE_STEM}.{ext}"))).find(|path| path.is_file())
}

/// Defaults, file and environment merged in order. Callers merge their own
/// command-line overrides on top before calling [`Config::from_figment`].
pub fn figment(explicit: Option<&Path>) -> Result<Figment> {
    let file = match explicit {
        Some(path) if !path.is_file() => exn::bail!(ErrorKind::FileNotFound(path.to_path_buf())),
        Some(path) => Some(path.to_path_buf()),
        None => default_file(),
    };
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    if let Some(file) = file {
        tracing::debug!(path = %file.display(), "Loading configuration file");
        let ext = file.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
        figment = match ext.as_deref() {
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(file)),
            Some("json") => figment.merge(Json::file_exact(file)),
            _ => figment.merge(Toml::file_exact(file)),
        };
    }
    Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
}

impl Config {
    /// Extract and validate.
    #[instrument(skip_all)]
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from defaults, file and environment only.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::from_figment(figment(explicit)?)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| ErrorKind::Invalid(reason.to_string());
        if self.pack.name.trim().is_empty() {
            exn::bail!(invalid("pack.name must not be empty"));
        }
        if self.data.tracks.as_os_str().is_empty() {
            exn::bail!(invalid("data.tracks must name the track database"));
        }
        if self.jobs.concurrency == Some(0) {
            exn::bail!(invalid("jobs.concurrency must be at least 1"));
        }
        if self.thumbnails.width == 0 || self.thumbnails.height == 0 {
            exn::bail!(invalid("thumbnail dimensions must be non-zero"));
        }
        if self.wszst.trim().is_empty() {
            exn::bail!(invalid("wszst must name an executable"));
        }
        Ok(())
    }

    /// Building a pack needs something to scan; resolving hashes doesn't.
    pub fn require_sources(&self) -> Result<()> {
        if self.inputs.is_empty() && self.volume.is_none() {
            exn::bail!(ErrorKind::Invalid("at least one input directory or a volume is required".to_string()));
        }
        Ok(())
    }
}
