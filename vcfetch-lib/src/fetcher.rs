//! Pipeline orchestration
//!
//! Runtimes are processed strictly one at a time, in manifest order. A
//! runtime either completes, skips with a reason, or fails; a failure is
//! contained at the per-runtime boundary and never aborts the batch.

use crate::classify::{classify, ExtractionStrategy, OLD_GENERATION_FLOOR};
use crate::config::Config;
use crate::download::DownloadManager;
use crate::error::{Result, VcFetchError};
use crate::expand::{expand_cab, normalize_arch_suffixes};
use crate::extract::{extract_bundle, extract_legacy, locate_bundle_cabs, locate_legacy_cabs};
use crate::manifest::{RuntimeDescriptor, RuntimeManifest, ToolManifest};
use crate::tools::ToolProvisioner;
use std::fmt;
use std::path::Path;
use tracing::{error, info};

/// Why a runtime was skipped rather than processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Generation below the floor and old versions were not requested
    OldVersion,
    /// Output directory already populated
    AlreadyPresent,
    /// No known extraction path for this generation
    Unsupported,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::OldVersion => write!(f, "old version not requested"),
            SkipReason::AlreadyPresent => write!(f, "already have"),
            SkipReason::Unsupported => write!(f, "no known extraction path"),
        }
    }
}

/// Terminal state of one runtime's pipeline. Failure travels on the
/// error channel and is accounted separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeOutcome {
    Skipped(SkipReason),
    Done { payloads: usize },
}

/// Batch tallies reported at the end of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Drives the fetch/extract/expand/normalize pipeline over the manifest.
pub struct Fetcher {
    config: Config,
    runtimes: Vec<RuntimeDescriptor>,
    downloader: DownloadManager,
    tools: ToolProvisioner,
}

impl Fetcher {
    /// Load and validate manifests and set up collaborators. Manifest
    /// problems are fatal here: no descriptor can be trusted once one is
    /// malformed.
    pub fn new(config: Config) -> Result<Self> {
        let runtime_manifest = match config.runtime_manifest {
            Some(ref path) => RuntimeManifest::load(path)?,
            None => RuntimeManifest::builtin()?,
        };
        let tool_manifest = match config.tool_manifest {
            Some(ref path) => ToolManifest::load(path)?,
            None => ToolManifest::builtin()?,
        };

        let runtimes = runtime_manifest.x64()?.to_vec();
        let downloader = DownloadManager::new(config.download_dir.clone(), config.quiet)?;
        let tools = ToolProvisioner::new(config.tools_dir.clone(), tool_manifest, config.quiet);

        Ok(Self {
            config,
            runtimes,
            downloader,
            tools,
        })
    }

    /// Descriptors selected for this run, in manifest order.
    fn selected(&self) -> Vec<RuntimeDescriptor> {
        self.runtimes
            .iter()
            .filter(|r| match self.config.only_version {
                Some(ref v) => &r.version == v,
                None => true,
            })
            .cloned()
            .collect()
    }

    /// Process the whole batch sequentially. One runtime's failure is
    /// reported and the batch continues. Ends with the temp/download
    /// cleanup unless suppressed.
    pub async fn run(&mut self) -> Result<BatchReport> {
        let mut report = BatchReport::default();

        for runtime in self.selected() {
            match self.process_runtime(&runtime).await {
                Ok(RuntimeOutcome::Done { payloads }) => {
                    info!(
                        "Fetched {} ({} payload cabinet(s))",
                        runtime.version, payloads
                    );
                    report.done += 1;
                }
                Ok(RuntimeOutcome::Skipped(_)) => {
                    report.skipped += 1;
                }
                Err(e) => {
                    error!("Error processing {}: {}", runtime.version, e);
                    report.failed += 1;
                }
            }
        }

        if !self.config.keep_temp {
            self.config.cleanup_temporary()?;
        }

        Ok(report)
    }

    /// Run the pipeline for a single runtime.
    ///
    /// Skip gates run in order before any network or filesystem work:
    /// the old-version flag, the populated output directory, then the
    /// unsupported generation.
    pub async fn process_runtime(&mut self, runtime: &RuntimeDescriptor) -> Result<RuntimeOutcome> {
        let major = runtime.major_generation()?;

        if !self.config.include_old_versions && major < OLD_GENERATION_FLOOR {
            // Reported even in quiet mode, like every skip.
            println!("Skipping {} ({})", runtime.version, SkipReason::OldVersion);
            return Ok(RuntimeOutcome::Skipped(SkipReason::OldVersion));
        }

        let output_dir = self.config.output_dir(&runtime.version);
        if dir_is_populated(&output_dir)? {
            println!("Already have {}", runtime.version);
            return Ok(RuntimeOutcome::Skipped(SkipReason::AlreadyPresent));
        }

        let strategy = classify(major);
        if strategy == ExtractionStrategy::Unsupported {
            println!(
                "Cannot extract the {} runtime ({}). Skipping.",
                runtime.version,
                SkipReason::Unsupported
            );
            return Ok(RuntimeOutcome::Skipped(SkipReason::Unsupported));
        }

        std::fs::create_dir_all(&output_dir)?;

        let installer = self
            .downloader
            .fetch(
                &runtime.url,
                runtime.installer_filename(),
                runtime.sha256.as_deref(),
            )
            .await?;

        let quiet = self.config.quiet;
        let cabs = match strategy {
            ExtractionStrategy::LegacySelfExtracting => {
                let seven_za = self.tools.seven_zip(&self.downloader).await?;
                let work = extract_legacy(&seven_za, &installer, &self.config.tmp_dir, quiet)?;
                locate_legacy_cabs(&work)?
            }
            ExtractionStrategy::ModernBundle => {
                let dark = self.tools.dark(&self.downloader).await?;
                let work = extract_bundle(&dark, &installer, &self.config.tmp_dir, quiet)?;
                locate_bundle_cabs(&work)?
            }
            ExtractionStrategy::Unsupported => unreachable!("skipped above"),
        };

        if cabs.is_empty() {
            return Err(VcFetchError::Extraction {
                tool: "locate".into(),
                code: None,
                detail: format!("no cabinet payloads found for {}", runtime.version),
            });
        }

        for cab in &cabs {
            expand_cab(cab, &output_dir, quiet)?;
        }

        normalize_arch_suffixes(&output_dir)?;

        Ok(RuntimeOutcome::Done {
            payloads: cabs.len(),
        })
    }

    /// Standalone cleanup of the temp and download roots.
    pub fn cleanup_temporary(&self) -> Result<()> {
        self.config.cleanup_temporary()
    }
}

/// The idempotency marker: an output directory counts as processed when
/// it exists and holds at least one entry. Deliberately coarse; a prior
/// interrupted run that wrote one file reads as done.
fn dir_is_populated(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(false);
    }
    Ok(std::fs::read_dir(dir)?.next().is_some())
}
