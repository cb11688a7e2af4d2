//! Runtime and tool manifests
//!
//! The set of redistributables to fetch and the bootstrap sources for the
//! external extraction tools are plain JSON documents. Built-in copies are
//! embedded in the binary; either can be overridden with a file on disk.

use crate::classify::major_generation;
use crate::error::{Result, VcFetchError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// The only payload architecture in scope.
pub const ARCH: &str = "x64";

const BUILTIN_RUNTIMES: &str = include_str!("../data/runtimes.json");
const BUILTIN_TOOLS: &str = include_str!("../data/tools.json");

/// One installable redistributable version and its download source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeDescriptor {
    /// Dot-separated version string, e.g. "14.40.33810". The leading
    /// numeric segment is the major generation.
    pub version: String,

    /// Installer download URL
    pub url: String,

    /// Optional SHA256 checksum of the installer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl RuntimeDescriptor {
    /// Major generation parsed from the version string.
    pub fn major_generation(&self) -> Result<u32> {
        major_generation(&self.version)
    }

    /// Cache filename for the downloaded installer, e.g.
    /// "14.40.33810_vc_redist.x64.exe".
    pub fn installer_filename(&self) -> String {
        let name = self.url.rsplit('/').next().unwrap_or("installer.exe");
        format!("{}_{}", self.version, name).to_lowercase()
    }
}

/// Ordered collection of runtime descriptors, keyed by architecture.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeManifest {
    runtimes: HashMap<String, Vec<RuntimeDescriptor>>,
}

impl RuntimeManifest {
    /// Load the manifest embedded in the binary.
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_RUNTIMES)
    }

    /// Load a manifest from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Every version must carry a parseable major generation; a manifest
    /// with one bad descriptor is rejected whole.
    fn validate(&self) -> Result<()> {
        for descriptor in self.runtimes.values().flatten() {
            descriptor.major_generation()?;
        }
        Ok(())
    }

    /// Descriptors for the in-scope architecture, in manifest order.
    pub fn x64(&self) -> Result<&[RuntimeDescriptor]> {
        self.runtimes
            .get(ARCH)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                VcFetchError::Config(format!("manifest has no {ARCH:?} runtime list"))
            })
    }
}

/// Download sources for the 7-Zip bootstrap pair.
#[derive(Debug, Clone, Deserialize)]
pub struct SevenZipSource {
    /// Minimal self-extractor (7zr.exe) used to unpack the full tool
    pub bootstrap: String,
    /// Archive containing the full standalone tool (7za.exe)
    pub archive: String,
}

/// Download source for the WiX toolset binaries.
#[derive(Debug, Clone, Deserialize)]
pub struct WixSource {
    pub url: String,
}

/// Bootstrap sources for both external extraction tools.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolManifest {
    pub sevenzip: SevenZipSource,
    pub wix: WixSource,
}

impl ToolManifest {
    pub fn builtin() -> Result<Self> {
        Ok(serde_json::from_str(BUILTIN_TOOLS)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }
}
