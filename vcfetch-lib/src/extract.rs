//! Installer container extraction and cabinet location
//!
//! Each installer generation needs a different external tool and a
//! different rule for finding the payload cabinets it leaves behind:
//! legacy self-extractors drop cabinets flat into the working directory,
//! burn bundles bury one cab1.cab per package inside the attached
//! container.

use crate::error::{Result, VcFetchError};
use glob::glob;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Package directories inside a burn bundle end with this marker.
pub const ARCH_SUFFIX: &str = "_amd64";

/// Run an external tool to completion, capturing both output streams.
///
/// Captured stdout is echoed at debug level when not quiet; stderr is
/// always kept for the error report. Non-zero exit becomes an
/// `Extraction` error carrying the exit code and diagnostics.
pub(crate) fn run_tool(program: &Path, args: &[&str], quiet: bool) -> Result<()> {
    let tool = program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string());

    let output = Command::new(program).args(args).output().map_err(|e| {
        VcFetchError::Extraction {
            tool: tool.clone(),
            code: None,
            detail: format!("failed to spawn: {e}"),
        }
    })?;

    if !quiet && !output.stdout.is_empty() {
        debug!("{tool}: {}", String::from_utf8_lossy(&output.stdout).trim());
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let detail = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        return Err(VcFetchError::Extraction {
            tool,
            code: output.status.code(),
            detail,
        });
    }

    Ok(())
}

/// Create a uniquely named working directory under the temp root.
///
/// The directory is detached from its guard: intermediate trees stay on
/// disk until the batch-end cleanup pass, also across failed runtimes.
pub fn create_work_area(tmp_root: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(tmp_root)?;
    let dir = tempfile::Builder::new()
        .prefix("extract-")
        .tempdir_in(tmp_root)?;
    Ok(dir.into_path())
}

/// Unpack a legacy self-extracting installer with 7-Zip, keeping only
/// cabinet entries. Fails when nothing was produced: a superficially
/// valid installer without cabinets must not propagate an empty output
/// directory downstream.
pub fn extract_legacy(
    seven_za: &Path,
    installer: &Path,
    tmp_root: &Path,
    quiet: bool,
) -> Result<PathBuf> {
    let work = create_work_area(tmp_root)?;

    run_tool(
        seven_za,
        &[
            "x",
            &format!("-o{}", work.display()),
            &installer.display().to_string(),
            "-i!*.cab",
        ],
        quiet,
    )?;

    if std::fs::read_dir(&work)?.next().is_none() {
        return Err(VcFetchError::Extraction {
            tool: "7za".into(),
            code: None,
            detail: format!("no cabinet files produced from {}", installer.display()),
        });
    }

    Ok(work)
}

/// Decompile a burn bundle with dark. Emptiness is not checked here; a
/// bundle without payloads surfaces later as zero located cabinets.
pub fn extract_bundle(
    dark: &Path,
    installer: &Path,
    tmp_root: &Path,
    quiet: bool,
) -> Result<PathBuf> {
    let work = create_work_area(tmp_root)?;

    run_tool(
        dark,
        &[
            "-nologo",
            "-x",
            &work.display().to_string(),
            &installer.display().to_string(),
        ],
        quiet,
    )?;

    Ok(work)
}

/// Cabinets left by a legacy self-extractor: every *.cab directly in the
/// working directory (flat, non-recursive).
pub fn locate_legacy_cabs(work: &Path) -> Result<Vec<PathBuf>> {
    let pattern = work.join("*.cab");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| VcFetchError::Config(format!("non-UTF8 work path: {}", work.display())))?;

    let mut cabs: Vec<PathBuf> = glob(pattern)
        .map_err(|e| VcFetchError::Config(format!("bad glob pattern: {e}")))?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    cabs.sort();
    Ok(cabs)
}

/// Cabinets inside a decompiled burn bundle: one cab1.cab per package
/// directory with the architecture suffix under AttachedContainer/packages.
/// Re-queries the filesystem on every call.
pub fn locate_bundle_cabs(work: &Path) -> Result<Vec<PathBuf>> {
    let packages = work.join("AttachedContainer").join("packages");
    if !packages.is_dir() {
        return Ok(Vec::new());
    }

    let mut cabs = Vec::new();
    for entry in std::fs::read_dir(&packages)? {
        let path = entry?.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if path.is_dir() && name.ends_with(ARCH_SUFFIX) {
            cabs.push(path.join("cab1.cab"));
        }
    }
    cabs.sort();
    Ok(cabs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn work_areas_are_unique_and_live_under_the_root() {
        let tmp = TempDir::new().unwrap();
        let a = create_work_area(tmp.path()).unwrap();
        let b = create_work_area(tmp.path()).unwrap();
        assert_ne!(a, b);
        assert!(a.is_dir());
        assert!(b.is_dir());
        assert!(a.starts_with(tmp.path()));
    }

    #[test]
    fn work_area_survives_guard_drop() {
        let tmp = TempDir::new().unwrap();
        let work = create_work_area(tmp.path()).unwrap();
        // The path was detached; nothing should have deleted it.
        assert!(work.is_dir());
    }

    #[test]
    fn legacy_locator_sees_only_flat_cabs() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("vc_red.cab"), b"x").unwrap();
        std::fs::write(tmp.path().join("setup.exe"), b"x").unwrap();
        std::fs::create_dir(tmp.path().join("nested")).unwrap();
        std::fs::write(tmp.path().join("nested").join("inner.cab"), b"x").unwrap();

        let cabs = locate_legacy_cabs(tmp.path()).unwrap();
        assert_eq!(cabs, vec![tmp.path().join("vc_red.cab")]);
    }

    #[test]
    fn bundle_locator_walks_the_attached_container() {
        let tmp = TempDir::new().unwrap();
        let packages = tmp.path().join("AttachedContainer").join("packages");
        for package in ["vcRuntimeMinimum_amd64", "vcRuntimeAdditional_amd64"] {
            let dir = packages.join(package);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("cab1.cab"), b"x").unwrap();
        }
        // Wrong architecture and stray files are ignored.
        std::fs::create_dir_all(packages.join("vcRuntimeMinimum_x86")).unwrap();
        std::fs::write(packages.join("readme.txt"), b"x").unwrap();

        let cabs = locate_bundle_cabs(tmp.path()).unwrap();
        assert_eq!(
            cabs,
            vec![
                packages.join("vcRuntimeAdditional_amd64").join("cab1.cab"),
                packages.join("vcRuntimeMinimum_amd64").join("cab1.cab"),
            ]
        );
    }

    #[test]
    fn bundle_locator_is_empty_without_the_container() {
        let tmp = TempDir::new().unwrap();
        assert!(locate_bundle_cabs(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn bundle_locator_requeries_the_filesystem() {
        let tmp = TempDir::new().unwrap();
        let packages = tmp.path().join("AttachedContainer").join("packages");
        std::fs::create_dir_all(packages.join("a_amd64")).unwrap();
        assert_eq!(locate_bundle_cabs(tmp.path()).unwrap().len(), 1);

        std::fs::create_dir_all(packages.join("b_amd64")).unwrap();
        assert_eq!(locate_bundle_cabs(tmp.path()).unwrap().len(), 2);
    }

    #[test]
    fn run_tool_reports_exit_code_and_stderr() {
        // `sh -c` keeps the test independent of any provisioned tool.
        let err = run_tool(
            Path::new("/bin/sh"),
            &["-c", "echo boom >&2; exit 3"],
            true,
        )
        .unwrap_err();
        match err {
            VcFetchError::Extraction { tool, code, detail } => {
                assert_eq!(tool, "sh");
                assert_eq!(code, Some(3));
                assert_eq!(detail, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn run_tool_fails_cleanly_on_missing_program() {
        let err = run_tool(Path::new("/nonexistent/7za"), &["x"], true).unwrap_err();
        assert!(matches!(err, VcFetchError::Extraction { code: None, .. }));
    }
}
