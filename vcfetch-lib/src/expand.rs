//! Cabinet expansion and output filename normalization

use crate::error::{Result, VcFetchError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use tracing::debug;

/// Resolve the platform cabinet-expansion utility once per process.
fn expand_utility() -> Result<&'static Path> {
    static EXPAND: OnceLock<Option<PathBuf>> = OnceLock::new();
    EXPAND
        .get_or_init(|| {
            which::which("expand")
                .or_else(|_| which::which("expand.exe"))
                .ok()
        })
        .as_deref()
        .ok_or_else(|| VcFetchError::Expansion {
            tool: "expand".into(),
            code: None,
            detail: "expand utility not found in PATH".into(),
        })
}

/// Expand one cabinet into the runtime's output directory.
///
/// All cabinets of a runtime share the same destination; a colliding
/// filename is overwritten by the later cabinet (the installers do not
/// produce colliding names within one runtime in practice).
pub fn expand_cab(cab: &Path, dest: &Path, quiet: bool) -> Result<()> {
    let expand = expand_utility()?;

    let output = Command::new(expand)
        .arg("-F:*")
        .arg(cab)
        .arg(dest)
        .output()
        .map_err(|e| VcFetchError::Expansion {
            tool: "expand".into(),
            code: None,
            detail: format!("failed to spawn: {e}"),
        })?;

    if !quiet && !output.stdout.is_empty() {
        debug!("expand: {}", String::from_utf8_lossy(&output.stdout).trim());
    }

    if !output.status.success() {
        return Err(VcFetchError::Expansion {
            tool: "expand".into(),
            code: output.status.code(),
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(())
}

/// Filenames carrying the architecture marker next to their extension:
/// either "name.dll_amd64" (what the installers actually produce) or
/// "name_amd64.dll".
fn arch_suffix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:(?P<trail>.+\.[A-Za-z0-9]+)_amd64|(?P<stem>.+?)_amd64(?P<ext>\.[A-Za-z0-9]+))$")
            .expect("valid suffix pattern")
    })
}

/// Canonical name for a file carrying the architecture marker, or None
/// if the name is already canonical.
fn normalized_name(name: &str) -> Option<String> {
    let captures = arch_suffix_pattern().captures(name)?;
    if let Some(trail) = captures.name("trail") {
        return Some(trail.as_str().to_string());
    }
    let stem = captures.name("stem")?.as_str();
    let ext = captures.name("ext")?.as_str();
    Some(format!("{stem}{ext}"))
}

/// Strip the architecture suffix from every expanded file in a directory.
///
/// Pure rename; running it again on an already-normalized directory finds
/// nothing to match and changes nothing. Returns the rename count.
pub fn normalize_arch_suffixes(dir: &Path) -> Result<usize> {
    let mut renamed = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if let Some(new_name) = normalized_name(name) {
            debug!("Renaming {} -> {}", name, new_name);
            std::fs::rename(&path, dir.join(new_name))?;
            renamed += 1;
        }
    }
    Ok(renamed)
}
