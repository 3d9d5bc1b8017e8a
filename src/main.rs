//! `ctpack`: curate custom track containers into a deduplicated pack.

mod build;
mod cli;
mod data;
mod error;
mod logging;
mod resolve;

use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use ctpack_config::Config;
use exn::ResultExt;
use std::process::ExitCode;

/// Conventional status for a run stopped by SIGINT.
const INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let figment = ctpack_config::figment(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    match cli.command {
        Command::Build(args) => {
            let config = Config::from_figment(args.apply(figment)).or_raise(|| ErrorKind::Config)?;
            let report = build::run(&config).await?;
            if report.cancelled {
                return Ok(ExitCode::from(INTERRUPTED));
            }
            Ok(ExitCode::SUCCESS)
        },
        Command::Resolve(args) => {
            let config = Config::from_figment(figment).or_raise(|| ErrorKind::Config)?;
            let resolver = data::resolver(&config.data)?;
            resolve::run(&resolver, &args.hashes)?;
            Ok(ExitCode::SUCCESS)
        },
    }
}
