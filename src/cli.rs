use clap::{ArgAction, Args, Parser, Subcommand};
use ctpack_config::ManifestFormat;
use figment::Figment;
use figment::providers::Serialized;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ctpack", author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// More logging; repeat for even more (`RUST_LOG` takes precedence)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan the inputs and build the pack
    Build(BuildArgs),
    /// Print how each content hash resolves
    Resolve(ResolveArgs),
}

#[derive(Debug, Default, Args)]
pub struct BuildArgs {
    /// Directory of loose track containers; repeatable, replaces configured inputs
    #[arg(short, long = "input", value_name = "DIR")]
    pub inputs: Vec<PathBuf>,

    /// Encrypted distribution volume to decrypt, mount and scan
    #[arg(long, value_name = "FILE")]
    pub blob: Option<PathBuf>,

    /// Pack output directory
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Maximum concurrent hashes and jobs [default: available parallelism]
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    #[arg(long)]
    pub no_thumbnails: bool,

    #[arg(long)]
    pub no_recompress: bool,

    /// Don't read or update the hash cache
    #[arg(long)]
    pub no_cache: bool,

    #[arg(long, value_name = "FORMAT")]
    pub format: Option<ManifestFormat>,
}
impl BuildArgs {
    /// Layer the flags that were given over the loaded configuration.
    pub fn apply(&self, mut figment: Figment) -> Figment {
        if !self.inputs.is_empty() {
            figment = figment.merge(Serialized::default("inputs", &self.inputs));
        }
        if let Some(blob) = &self.blob {
            figment = figment.merge(Serialized::default("volume.blob", blob));
        }
        if let Some(output) = &self.output {
            figment = figment.merge(Serialized::default("output.dir", output));
        }
        if let Some(jobs) = self.jobs {
            figment = figment.merge(Serialized::default("jobs.concurrency", jobs));
        }
        if self.no_thumbnails {
            figment = figment.merge(Serialized::default("jobs.thumbnails", false));
        }
        if self.no_recompress {
            figment = figment.merge(Serialized::default("jobs.recompress", false));
        }
        if self.no_cache {
            figment = figment.merge(Serialized::default("cache.enabled", false));
        }
        if let Some(format) = self.format {
            figment = figment.merge(Serialized::default("output.format", format));
        }
        figment
    }
}

#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Content hashes (40 hex digits)
    #[arg(required = true, value_name = "SHA1")]
    pub hashes: Vec<String>,
}
