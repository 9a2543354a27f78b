use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod build;
mod commands;
mod config;
mod git;
mod publish;

/// Publish workshop notebooks and pages as a static site and a Codespaces branch
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Commit and push the main branch, and push the workspace branch
    #[arg(long, default_value = "false")]
    commit: bool,

    /// Keep the temporary workspace repository for inspection
    #[arg(long, default_value = "false")]
    keep_temp: bool,

    /// The path to the configuration file
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_FILE)]
    config_file: Option<PathBuf>,
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    commands::publish::run(&args)?;

    Ok(())
}
