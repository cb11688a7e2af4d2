//! Installer generation classification
//!
//! The major version number of a runtime decides which installer container
//! format its redistributable ships in, and therefore which external tool
//! chain unpacks it.

use crate::error::{Result, VcFetchError};

/// Generations below this are only processed with `include_old_versions`.
pub const OLD_GENERATION_FLOOR: u32 = 14;

/// Extraction strategy for one installer generation.
///
/// Adding support for a new generation means adding a variant here and a
/// handler in the pipeline, not editing the existing branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// No known extraction path (Visual C++ 2010). Reported and skipped.
    Unsupported,
    /// Plain self-extracting archive; cabinets are pulled out with 7-Zip.
    LegacySelfExtracting,
    /// WiX burn bundle; decompiled with dark, cabinets live in the
    /// attached container.
    ModernBundle,
}

/// Parse the major generation from a dot-separated version string.
pub fn major_generation(version: &str) -> Result<u32> {
    let first = version.split('.').next().unwrap_or("");
    first.parse::<u32>().map_err(|_| {
        VcFetchError::Config(format!("unparseable runtime version: {version:?}"))
    })
}

/// Classify a major generation into its extraction strategy.
pub fn classify(major: u32) -> ExtractionStrategy {
    match major {
        10 => ExtractionStrategy::Unsupported,
        g if g < 11 => ExtractionStrategy::LegacySelfExtracting,
        _ => ExtractionStrategy::ModernBundle,
    }
}
