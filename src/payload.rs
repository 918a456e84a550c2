//! Payload materialization: the app source tree and its bundled workbook.

use anyhow::{Context, Result, bail};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::constants::{DEPS_STAMP_FILE, STATE_DIR};

/// Remove everything a previous build left in the runtime root, keeping
/// only the dependency stamp so unchanged dependencies still skip
/// provisioning. Returns the number of entries removed.
pub fn clear_root(context: &Path, root: &Path) -> Result<usize> {
    if !root.exists() {
        return Ok(0);
    }
    let context = context
        .canonicalize()
        .with_context(|| format!("Build context not found: {}", context.display()))?;
    let root = root
        .canonicalize()
        .with_context(|| format!("Runtime root not found: {}", root.display()))?;
    if context.starts_with(&root) {
        bail!(
            "Build context {} lies inside the runtime root {}",
            context.display(),
            root.display()
        );
    }

    let mut removed = 0;
    for entry in read_entries(&root)? {
        let path = entry.path();
        if entry.file_name() == STATE_DIR && path.is_dir() {
            for state in read_entries(&path)? {
                if state.file_name() != DEPS_STAMP_FILE {
                    remove_entry(&state.path())?;
                    removed += 1;
                }
            }
        } else {
            remove_entry(&path)?;
            removed += 1;
        }
    }
    debug!("Cleared {} entries from {}", removed, root.display());
    Ok(removed)
}

fn read_entries(dir: &Path) -> Result<Vec<fs::DirEntry>> {
    fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("Failed to read directory: {}", dir.display()))
}

fn remove_entry(path: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
    .with_context(|| format!("Failed to remove {}", path.display()))
}

/// Copy only the dependency manifest into the runtime root, so it can be
/// resolved before the rest of the payload exists there.
pub fn stage_manifests(config: &Config, context: &Path, root: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(root)
        .with_context(|| format!("Failed to create runtime root: {}", root.display()))?;

    let mut staged = Vec::new();
    if let Some(manifest) = &config.dependencies.manifest {
        let src = context.join(manifest);
        let dest = root.join(manifest);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::copy(&src, &dest)
            .with_context(|| format!("Failed to stage manifest: {}", src.display()))?;
        debug!("Staged {} -> {}", src.display(), dest.display());
        staged.push(dest);
    }
    Ok(staged)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct MaterializeSummary {
    pub files: usize,
    pub bytes: u64,
}

/// Copy the whole build context into the runtime root.
///
/// Contents are not filtered or validated. The only exclusion is the root
/// itself when it lives inside the context.
pub fn materialize(context: &Path, root: &Path) -> Result<MaterializeSummary> {
    fs::create_dir_all(root)
        .with_context(|| format!("Failed to create runtime root: {}", root.display()))?;

    let context = context
        .canonicalize()
        .with_context(|| format!("Build context not found: {}", context.display()))?;
    let root = root
        .canonicalize()
        .with_context(|| format!("Runtime root not found: {}", root.display()))?;

    if context == root {
        bail!(
            "Build context and runtime root are the same directory: {}",
            root.display()
        );
    }

    let mut summary = MaterializeSummary::default();
    let walker = WalkDir::new(&context)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| e.path() != root.as_path());

    for entry in walker {
        let entry = entry.context("Failed to walk build context")?;
        let rel = entry
            .path()
            .strip_prefix(&context)
            .context("Walked outside the build context")?;
        let dest = root.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&dest)
                .with_context(|| format!("Failed to create directory: {}", dest.display()))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &dest)?;
        } else {
            summary.bytes += fs::copy(entry.path(), &dest)
                .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
            summary.files += 1;
        }
    }

    Ok(summary)
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dest: &Path) -> Result<()> {
    let target = fs::read_link(src)
        .with_context(|| format!("Failed to read link: {}", src.display()))?;
    if fs::symlink_metadata(dest).is_ok() {
        fs::remove_file(dest)
            .with_context(|| format!("Failed to replace {}", dest.display()))?;
    }
    std::os::unix::fs::symlink(&target, dest)
        .with_context(|| format!("Failed to link {}", dest.display()))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dest: &Path) -> Result<()> {
    fs::copy(src, dest).with_context(|| format!("Failed to copy {}", src.display()))?;
    Ok(())
}

/// What the application needs at start, checked against the runtime root.
#[derive(Debug, PartialEq, Eq)]
pub struct PayloadReport {
    pub data_artifact: Option<String>,
    pub missing: Vec<String>,
}

pub fn verify(config: &Config, root: &Path) -> PayloadReport {
    let mut missing = Vec::new();

    if !root.join(&config.entrypoint).is_file() {
        missing.push(config.entrypoint.clone());
    }

    // The app takes the first candidate that exists.
    let data_artifact = config
        .data_artifacts
        .iter()
        .find(|name| root.join(name).is_file())
        .cloned();

    if data_artifact.is_none() && !config.data_artifacts.is_empty() {
        missing.push(format!("one of {}", config.data_artifacts.join(", ")));
    }

    PayloadReport {
        data_artifact,
        missing,
    }
}

/// Fail on missing payload files when strict; otherwise only warn, leaving
/// detection to application start.
pub fn enforce(report: &PayloadReport, strict: bool) -> Result<()> {
    if report.missing.is_empty() {
        return Ok(());
    }
    let list = report.missing.join("; ");
    if strict {
        bail!("Payload is missing required files: {}", list);
    }
    warn!(
        "Payload is missing required files: {} (the application will fail at start)",
        list
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::parse("app: dashboard\n").unwrap()
    }

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_stage_copies_only_manifest() {
        let ctx = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        write(ctx.path(), "requirements.txt", "streamlit\n");
        write(ctx.path(), "app.py", "print()\n");

        let staged = stage_manifests(&config(), ctx.path(), root.path()).unwrap();
        assert_eq!(staged, vec![root.path().join("requirements.txt")]);
        assert!(!root.path().join("app.py").exists());
    }

    #[test]
    fn test_stage_missing_manifest_fails() {
        let ctx = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        assert!(stage_manifests(&config(), ctx.path(), root.path()).is_err());
    }

    #[test]
    fn test_materialize_copies_tree() {
        let ctx = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        write(ctx.path(), "app.py", "import streamlit\n");
        write(ctx.path(), "Excel.xlsm", "workbook");
        write(ctx.path(), "src/excel_reader.py", "def load_wb(): ...\n");
        write(ctx.path(), "assets/logos/a.png", "png");

        let summary = materialize(ctx.path(), root.path()).unwrap();
        assert_eq!(summary.files, 4);
        assert!(root.path().join("src/excel_reader.py").is_file());
        assert_eq!(
            fs::read_to_string(root.path().join("Excel.xlsm")).unwrap(),
            "workbook"
        );
    }

    #[test]
    fn test_materialize_skips_nested_root() {
        let ctx = tempfile::tempdir().unwrap();
        write(ctx.path(), "app.py", "x");
        let root = ctx.path().join("out");

        let summary = materialize(ctx.path(), &root).unwrap();
        assert_eq!(summary.files, 1);
        assert!(root.join("app.py").is_file());
        assert!(!root.join("out").exists());
    }

    #[test]
    fn test_materialize_rejects_same_directory() {
        let ctx = tempfile::tempdir().unwrap();
        assert!(materialize(ctx.path(), ctx.path()).is_err());
    }

    #[test]
    fn test_verify_picks_first_existing_artifact() {
        let root = tempfile::tempdir().unwrap();
        write(root.path(), "app.py", "x");
        write(root.path(), "excel.xlsx", "x");
        write(root.path(), "Excel.xlsx", "x");

        let report = verify(&config(), root.path());
        assert_eq!(report.data_artifact.as_deref(), Some("Excel.xlsx"));
        assert!(report.missing.is_empty());
        assert!(enforce(&report, true).is_ok());
    }

    #[test]
    fn test_missing_workbook_is_deferred_unless_strict() {
        let root = tempfile::tempdir().unwrap();
        write(root.path(), "app.py", "x");

        let report = verify(&config(), root.path());
        assert!(report.data_artifact.is_none());
        assert_eq!(report.missing.len(), 1);
        assert!(report.missing[0].starts_with("one of Excel.xlsm"));

        assert!(enforce(&report, false).is_ok());
        assert!(enforce(&report, true).is_err());
    }

    #[test]
    fn test_missing_entrypoint_is_reported() {
        let root = tempfile::tempdir().unwrap();
        write(root.path(), "Excel.xlsm", "x");
        let report = verify(&config(), root.path());
        assert_eq!(report.missing, vec!["app.py".to_string()]);
    }

    #[test]
    fn test_clear_root_keeps_only_dependency_stamp() {
        let ctx = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        write(root.path(), "app.py", "x");
        write(root.path(), "Excel.xlsm", "old workbook");
        write(root.path(), "src/excel_reader.py", "x");
        write(root.path(), ".dashboot/deps.sha256", "abc");
        write(root.path(), ".dashboot/build.json", "{}");

        let removed = clear_root(ctx.path(), root.path()).unwrap();
        assert_eq!(removed, 4);
        assert!(!root.path().join("Excel.xlsm").exists());
        assert!(!root.path().join("src").exists());
        assert!(!root.path().join(".dashboot/build.json").exists());
        assert_eq!(
            fs::read_to_string(root.path().join(".dashboot/deps.sha256")).unwrap(),
            "abc"
        );
    }

    #[test]
    fn test_clear_root_refuses_root_holding_context() {
        let root = tempfile::tempdir().unwrap();
        write(root.path(), "ctx/app.py", "x");
        assert!(clear_root(&root.path().join("ctx"), root.path()).is_err());
        assert!(root.path().join("ctx/app.py").is_file());
    }

    #[test]
    fn test_clear_missing_root_is_noop() {
        let ctx = tempfile::tempdir().unwrap();
        let root = ctx.path().join("out");
        assert_eq!(clear_root(ctx.path(), &root).unwrap(), 0);
    }
}
