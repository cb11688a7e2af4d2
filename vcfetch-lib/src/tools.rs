//! External extraction tool provisioning
//!
//! Both tools are fetched on first use and reused from disk afterwards.
//! The 7-Zip standalone needs a two-step bootstrap: a minimal
//! self-extractor pulls the full tool out of a secondary archive. The WiX
//! toolset ships as a plain zip that is unpacked in place.

use crate::download::DownloadManager;
use crate::error::{Result, VcFetchError};
use crate::extract::run_tool;
use crate::manifest::ToolManifest;
use std::path::{Path, PathBuf};
use tracing::info;

/// Lazily provisions the external tools and caches their locations for
/// the process lifetime.
///
/// A failed provisioning poisons that tool: every later request fails
/// fast instead of re-downloading, so runtimes needing the other tool
/// keep running while runtimes needing the broken one all fail.
pub struct ToolProvisioner {
    tools_dir: PathBuf,
    manifest: ToolManifest,
    quiet: bool,
    seven_za: Option<PathBuf>,
    dark: Option<PathBuf>,
    seven_zip_poisoned: bool,
    wix_poisoned: bool,
}

impl ToolProvisioner {
    pub fn new(tools_dir: PathBuf, manifest: ToolManifest, quiet: bool) -> Self {
        Self {
            tools_dir,
            manifest,
            quiet,
            seven_za: None,
            dark: None,
            seven_zip_poisoned: false,
            wix_poisoned: false,
        }
    }

    /// Resolve the standalone 7-Zip executable, provisioning it on first
    /// use. Idempotent: artifacts already on disk are not re-downloaded.
    pub async fn seven_zip(&mut self, downloader: &DownloadManager) -> Result<PathBuf> {
        if let Some(ref path) = self.seven_za {
            return Ok(path.clone());
        }
        if self.seven_zip_poisoned {
            return Err(VcFetchError::ToolProvisioning(
                "7-Zip provisioning already failed this run".into(),
            ));
        }

        match self.provision_seven_zip(downloader).await {
            Ok(path) => {
                self.seven_za = Some(path.clone());
                Ok(path)
            }
            Err(e) => {
                self.seven_zip_poisoned = true;
                Err(VcFetchError::ToolProvisioning(format!("7-Zip: {e}")))
            }
        }
    }

    async fn provision_seven_zip(&self, downloader: &DownloadManager) -> Result<PathBuf> {
        let dir = self.tools_dir.join("7zip");
        std::fs::create_dir_all(&dir)?;

        let seven_za = dir.join("7za.exe");
        if seven_za.is_file() {
            return Ok(seven_za);
        }

        let bootstrap = dir.join("7zr.exe");
        if !bootstrap.is_file() {
            download_to(downloader, &self.manifest.sevenzip.bootstrap, &bootstrap).await?;
        }

        let archive = dir.join("7z-extra.7z");
        if !archive.is_file() {
            download_to(downloader, &self.manifest.sevenzip.archive, &archive).await?;
        }

        info!("Unpacking 7-Zip standalone into {}", dir.display());
        run_tool(
            &bootstrap,
            &[
                "x",
                &archive.display().to_string(),
                &format!("-o{}", dir.display()),
                "-aoa",
            ],
            self.quiet,
        )?;

        if !seven_za.is_file() {
            return Err(VcFetchError::ToolProvisioning(format!(
                "archive did not contain {}",
                seven_za.display()
            )));
        }

        Ok(seven_za)
    }

    /// Resolve the WiX dark executable, provisioning the toolset on first
    /// use.
    pub async fn dark(&mut self, downloader: &DownloadManager) -> Result<PathBuf> {
        if let Some(ref path) = self.dark {
            return Ok(path.clone());
        }
        if self.wix_poisoned {
            return Err(VcFetchError::ToolProvisioning(
                "WiX provisioning already failed this run".into(),
            ));
        }

        match self.provision_wix(downloader).await {
            Ok(path) => {
                self.dark = Some(path.clone());
                Ok(path)
            }
            Err(e) => {
                self.wix_poisoned = true;
                Err(VcFetchError::ToolProvisioning(format!("WiX: {e}")))
            }
        }
    }

    async fn provision_wix(&self, downloader: &DownloadManager) -> Result<PathBuf> {
        let dir = self.tools_dir.join("wix");
        let dark = dir.join("dark.exe");
        if dark.is_file() {
            return Ok(dark);
        }

        std::fs::create_dir_all(&dir)?;
        let zip_path = dir.join("wix.zip");
        download_to(downloader, &self.manifest.wix.url, &zip_path).await?;

        info!("Unpacking WiX toolset into {}", dir.display());
        unpack_zip(&zip_path, &dir)?;
        std::fs::remove_file(&zip_path)?;

        if !dark.is_file() {
            return Err(VcFetchError::ToolProvisioning(format!(
                "archive did not contain {}",
                dark.display()
            )));
        }

        Ok(dark)
    }
}

/// Fetch a tool artifact to an exact path. Tool artifacts live in the
/// tools tree, not the installer download cache, so they survive the
/// batch-end cleanup of the cache.
async fn download_to(downloader: &DownloadManager, url: &str, dest: &Path) -> Result<()> {
    downloader.fetch_to(url, dest, None).await
}

/// Unpack a zip archive fully into a directory.
fn unpack_zip(archive: &Path, dest: &Path) -> Result<()> {
    let file = std::fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let outpath = match entry.enclosed_name() {
            Some(path) => dest.join(path),
            None => continue,
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut outfile = std::fs::File::create(&outpath)?;
            std::io::copy(&mut entry, &mut outfile)?;
        }
    }

    Ok(())
}
