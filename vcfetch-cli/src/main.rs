//! vcfetch CLI

use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use vcfetch_lib::{Config, Fetcher, Result};

#[derive(Parser)]
#[command(name = "vcfetch")]
#[command(about = "Fetch Visual C++ redistributables and extract their runtime DLLs")]
#[command(version)]
struct Cli {
    /// Include versions older than Visual C++ 2015 (major generation 14)
    #[arg(short = 'i', long)]
    include_old_versions: bool,

    /// Echo external tool output as it is captured
    #[arg(short = 'v', long, conflicts_with = "silent")]
    verbose: bool,

    /// Suppress informational output (skip reasons are still reported)
    #[arg(short = 's', long)]
    silent: bool,

    /// Skip cleanup of temporary files and directories at the end of the run
    #[arg(long)]
    no_cleanup: bool,

    /// Perform cleanup of temporary files and directories, then exit
    #[arg(short = 'c', long)]
    clean_up: bool,

    /// Remove the output directory and everything in it, then exit
    #[arg(long)]
    remove_all: bool,

    /// Fetch only this redistributable version
    #[arg(long, value_name = "VERSION")]
    only: Option<String>,

    /// Output directory (default: ./vcruntimes)
    #[arg(short = 'o', long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Runtime manifest file (default: built-in manifest)
    #[arg(long, value_name = "FILE")]
    manifest: Option<PathBuf>,

    /// Tool manifest file (default: built-in manifest)
    #[arg(long, value_name = "FILE")]
    tool_manifest: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        "debug"
    } else if cli.silent {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!("vcfetch={log_level},vcfetch_lib={log_level}"))
        .init();

    let mut config = Config::new()?;
    if let Some(output) = cli.output {
        config.base_dir = output;
    }
    config.include_old_versions = cli.include_old_versions;
    config.quiet = cli.silent;
    config.verbose = cli.verbose;
    config.keep_temp = cli.no_cleanup;
    config.only_version = cli.only;
    config.runtime_manifest = cli.manifest;
    config.tool_manifest = cli.tool_manifest;

    if cli.remove_all {
        if config.base_dir.is_dir() {
            std::fs::remove_dir_all(&config.base_dir)?;
            println!("Removed {}", config.base_dir.display());
        } else {
            info!("{} does not exist", config.base_dir.display());
        }
        if !cli.clean_up {
            return Ok(());
        }
    }

    if cli.clean_up {
        config.cleanup_temporary()?;
        println!("Cleanup completed.");
        return Ok(());
    }

    config.ensure_dirs()?;

    // Manifest problems surface here and are the only nonzero exit:
    // per-runtime skips and failures never change the exit status.
    let mut fetcher = Fetcher::new(config)?;
    let report = fetcher.run().await?;

    if !cli.silent {
        println!(
            "{} fetched, {} skipped, {} failed",
            report.done, report.skipped, report.failed
        );
    }

    Ok(())
}
