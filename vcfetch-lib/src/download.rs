//! Download system with caching, retries and checksum verification

use crate::error::{Result, VcFetchError};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Attempts per URL before giving up
const MAX_ATTEMPTS: u32 = 3;

/// Base delay between attempts; grows linearly with the attempt number
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Per-attempt request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Download manager
pub struct DownloadManager {
    client: Client,
    cache_dir: PathBuf,
    quiet: bool,
}

impl DownloadManager {
    /// Create a new download manager caching into `cache_dir`.
    pub fn new(cache_dir: PathBuf, quiet: bool) -> Result<Self> {
        let client = Client::builder()
            .user_agent("vcfetch/0.1")
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        std::fs::create_dir_all(&cache_dir)?;

        Ok(Self {
            client,
            cache_dir,
            quiet,
        })
    }

    /// Fetch a URL into the cache, retrying with increasing backoff.
    ///
    /// An already-cached file is returned without touching the network
    /// (re-verified first when a checksum is supplied).
    pub async fn fetch<P: AsRef<Path>>(
        &self,
        url: &str,
        filename: P,
        expected_sha256: Option<&str>,
    ) -> Result<PathBuf> {
        let cache_file = self.cache_dir.join(filename.as_ref());
        self.fetch_to(url, &cache_file, expected_sha256).await?;
        Ok(cache_file)
    }

    /// Fetch a URL to an exact destination path with the same caching and
    /// retry behavior. Used for tool artifacts, which live in the tools
    /// tree rather than the installer cache.
    pub async fn fetch_to(
        &self,
        url: &str,
        cache_file: &Path,
        expected_sha256: Option<&str>,
    ) -> Result<()> {
        if cache_file.is_file() {
            match expected_sha256 {
                Some(expected) if !self.verify_checksum(cache_file, expected)? => {
                    // Stale or truncated cache entry
                    std::fs::remove_file(cache_file)?;
                }
                _ => return Ok(()),
            }
        }

        if !self.quiet {
            info!("Downloading {} to {}", url, cache_file.display());
        }

        let mut last_error = None;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.try_fetch(url, cache_file, expected_sha256).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if attempt < MAX_ATTEMPTS {
                        warn!("Attempt {attempt} failed for {url}: {e}, retrying...");
                        tokio::time::sleep(RETRY_DELAY * attempt).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(VcFetchError::Download(format!(
            "{url} failed after {MAX_ATTEMPTS} attempts: {}",
            last_error.expect("at least one attempt ran")
        )))
    }

    /// One download attempt. The destination is removed on any failure so
    /// a partial file can never satisfy the cache check of a later run.
    async fn try_fetch(
        &self,
        url: &str,
        dest: &Path,
        expected_sha256: Option<&str>,
    ) -> Result<()> {
        let result = self.stream_to_file(url, dest, expected_sha256).await;
        if result.is_err() && dest.exists() {
            let _ = std::fs::remove_file(dest);
        }
        result
    }

    async fn stream_to_file(
        &self,
        url: &str,
        dest: &Path,
        expected_sha256: Option<&str>,
    ) -> Result<()> {
        let mut response = self.client.get(url).send().await?.error_for_status()?;

        let total_size = response.content_length().unwrap_or(0);

        let pb = if !self.quiet && total_size > 0 {
            let pb = ProgressBar::new(total_size);
            let style = ProgressStyle::default_bar()
                .template("{msg} {bar:40.cyan/blue} {bytes}/{total_bytes} {eta}")
                .map_err(|e| VcFetchError::Download(format!("Progress bar template error: {}", e)))?;
            pb.set_style(style);
            pb.set_message("Downloading");
            Some(pb)
        } else {
            None
        };

        let mut file = std::fs::File::create(dest)?;
        let mut hasher = Sha256::new();

        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk)?;
            hasher.update(&chunk);

            if let Some(ref pb) = pb {
                pb.inc(chunk.len() as u64);
            }
        }

        if let Some(pb) = pb {
            pb.finish_with_message("Downloaded");
        }

        if let Some(expected) = expected_sha256 {
            let computed = format!("{:x}", hasher.finalize());
            if computed != expected {
                return Err(VcFetchError::ChecksumMismatch {
                    expected: expected.to_string(),
                    got: computed,
                });
            }
        }

        Ok(())
    }

    /// Verify SHA256 checksum of a file on disk.
    pub fn verify_checksum<P: AsRef<Path>>(&self, path: P, expected: &str) -> Result<bool> {
        let mut hasher = Sha256::new();
        let mut file = std::fs::File::open(path)?;
        std::io::copy(&mut file, &mut hasher)?;

        let computed = format!("{:x}", hasher.finalize());
        Ok(computed == expected)
    }

    /// Check if a file is cached.
    pub fn is_cached<P: AsRef<Path>>(&self, filename: P) -> bool {
        self.cache_dir.join(filename.as_ref()).is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn cached_file_short_circuits_the_network() {
        let tmp = TempDir::new().unwrap();
        let manager = DownloadManager::new(tmp.path().to_path_buf(), true).unwrap();
        std::fs::write(tmp.path().join("installer.exe"), b"payload").unwrap();

        // The URL is unreachable; a network touch would fail.
        let path = manager
            .fetch("http://127.0.0.1:1/unreachable", "installer.exe", None)
            .await
            .unwrap();
        assert_eq!(path, tmp.path().join("installer.exe"));
    }

    #[tokio::test]
    async fn cached_file_with_matching_checksum_is_accepted() {
        let tmp = TempDir::new().unwrap();
        let manager = DownloadManager::new(tmp.path().to_path_buf(), true).unwrap();
        std::fs::write(tmp.path().join("tool.7z"), b"payload").unwrap();

        let expected = format!("{:x}", Sha256::digest(b"payload"));
        let path = manager
            .fetch("http://127.0.0.1:1/unreachable", "tool.7z", Some(&expected))
            .await
            .unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn verify_checksum_detects_mismatch() {
        let tmp = TempDir::new().unwrap();
        let manager = DownloadManager::new(tmp.path().to_path_buf(), true).unwrap();
        let file = tmp.path().join("f");
        std::fs::write(&file, b"abc").unwrap();

        let good = format!("{:x}", Sha256::digest(b"abc"));
        assert!(manager.verify_checksum(&file, &good).unwrap());
        assert!(!manager.verify_checksum(&file, "deadbeef").unwrap());
    }

    #[test]
    fn is_cached_reflects_disk_state() {
        let tmp = TempDir::new().unwrap();
        let manager = DownloadManager::new(tmp.path().to_path_buf(), true).unwrap();
        assert!(!manager.is_cached("missing.exe"));
        std::fs::write(tmp.path().join("present.exe"), b"x").unwrap();
        assert!(manager.is_cached("present.exe"));
    }
}
