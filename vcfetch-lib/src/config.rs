//! Configuration management for vcfetch

use crate::error::{Result, VcFetchError};
use std::path::PathBuf;
use tracing::info;

/// vcfetch configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Output base directory; one vcruntime_<version> subdirectory per
    /// processed runtime
    pub base_dir: PathBuf,

    /// Cache directory for downloaded installers and tool archives
    pub download_dir: PathBuf,

    /// Directory holding the provisioned extraction tools
    pub tools_dir: PathBuf,

    /// Root for per-extraction working directories
    pub tmp_dir: PathBuf,

    /// Process generations older than Visual C++ 2015 (major 14)
    pub include_old_versions: bool,

    /// Suppress informational output (skip reasons are still reported)
    pub quiet: bool,

    /// Echo external tool output as it is captured
    pub verbose: bool,

    /// Don't delete temp/download directories at the end of a batch
    pub keep_temp: bool,

    /// Restrict the batch to a single version string
    pub only_version: Option<String>,

    /// Runtime manifest override (built-in manifest when None)
    pub runtime_manifest: Option<PathBuf>,

    /// Tool manifest override (built-in manifest when None)
    pub tool_manifest: Option<PathBuf>,
}

impl Config {
    /// Create a new config with default paths: output under ./vcruntimes,
    /// caches under the platform cache directory.
    pub fn new() -> Result<Self> {
        let base_dir = std::env::current_dir()?.join("vcruntimes");

        let cache_root = dirs::cache_dir()
            .ok_or_else(|| VcFetchError::Config("Could not determine cache directory".into()))?
            .join("vcfetch");

        Ok(Self::with_dirs(base_dir, cache_root))
    }

    /// Create a config rooted at explicit directories.
    pub fn with_dirs(base_dir: PathBuf, cache_root: PathBuf) -> Self {
        Self {
            base_dir,
            download_dir: cache_root.join("downloads"),
            tools_dir: cache_root.join("tools"),
            tmp_dir: cache_root.join("tmp"),
            include_old_versions: false,
            quiet: false,
            verbose: false,
            keep_temp: false,
            only_version: None,
            runtime_manifest: None,
            tool_manifest: None,
        }
    }

    /// Create all directories the pipeline writes into.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            &self.base_dir,
            &self.download_dir,
            &self.tools_dir,
            &self.tmp_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Output directory for one runtime version, lower-cased. Presence of
    /// any file in it marks the runtime as already processed.
    pub fn output_dir(&self, version: &str) -> PathBuf {
        self.base_dir
            .join(format!("vcruntime_{}", version).to_lowercase())
    }

    /// Delete the working-directory root and the download cache. Runs at
    /// the end of a batch unless suppressed, and standalone via the CLI.
    pub fn cleanup_temporary(&self) -> Result<()> {
        for dir in [&self.tmp_dir, &self.download_dir] {
            if dir.exists() {
                info!("Removing {}", dir.display());
                std::fs::remove_dir_all(dir)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config() -> (TempDir, Config) {
        let tmp = TempDir::new().unwrap();
        let config = Config::with_dirs(tmp.path().join("vcruntimes"), tmp.path().join("cache"));
        (tmp, config)
    }

    #[test]
    fn ensure_dirs_creates_the_tree() {
        let (_tmp, config) = test_config();
        config.ensure_dirs().unwrap();
        assert!(config.base_dir.is_dir());
        assert!(config.download_dir.is_dir());
        assert!(config.tools_dir.is_dir());
        assert!(config.tmp_dir.is_dir());
    }

    #[test]
    fn output_dir_is_lowercased_and_prefixed() {
        let (_tmp, config) = test_config();
        let dir = config.output_dir("14.0.2");
        assert_eq!(
            dir.file_name().unwrap().to_str().unwrap(),
            "vcruntime_14.0.2"
        );
        let dir = config.output_dir("9.0.30729.ABC");
        assert_eq!(
            dir.file_name().unwrap().to_str().unwrap(),
            "vcruntime_9.0.30729.abc"
        );
    }

    #[test]
    fn cleanup_removes_tmp_and_downloads_but_not_output() {
        let (_tmp, config) = test_config();
        config.ensure_dirs().unwrap();
        std::fs::write(config.tmp_dir.join("scratch"), b"x").unwrap();
        std::fs::write(config.download_dir.join("installer.exe"), b"x").unwrap();

        config.cleanup_temporary().unwrap();

        assert!(!config.tmp_dir.exists());
        assert!(!config.download_dir.exists());
        assert!(config.base_dir.exists());
        assert!(config.tools_dir.exists());
    }

    #[test]
    fn cleanup_is_a_noop_when_nothing_exists() {
        let (_tmp, config) = test_config();
        config.cleanup_temporary().unwrap();
        config.cleanup_temporary().unwrap();
    }
}
