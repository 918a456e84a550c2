//! Dependency provisioning.
//!
//! OS packages go in first (with the compiler toolchain and HTTP client every
//! image needs), then runtime libraries from the declared manifest and the
//! inline runtime tier. Any failing step aborts the whole phase.

use anyhow::{Context, Result, bail};
use indicatif::ProgressBar;
use log::info;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::config::DependencyConfig;
use crate::constants::*;
use crate::runner::{CommandRunner, Step};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    Any,
    /// A bare version, e.g. `3.1.2`
    Exact(String),
    /// A comparison, e.g. `>=1.30` or `==2.2.0`
    Spec(String),
}

impl VersionConstraint {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw == "*" {
            VersionConstraint::Any
        } else if raw.starts_with(['=', '<', '>', '~', '!']) {
            VersionConstraint::Spec(raw.to_string())
        } else {
            VersionConstraint::Exact(raw.to_string())
        }
    }

    fn as_str(&self) -> &str {
        match self {
            VersionConstraint::Any => "*",
            VersionConstraint::Exact(v) | VersionConstraint::Spec(v) => v,
        }
    }
}

/// Declared dependencies, split into tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySet {
    pub os: BTreeMap<String, VersionConstraint>,
    pub runtime: BTreeMap<String, VersionConstraint>,
    pub manifest: Option<String>,
}

impl DependencySet {
    pub fn from_config(deps: &DependencyConfig) -> Self {
        let mut os: BTreeMap<String, VersionConstraint> = deps
            .os
            .iter()
            .map(|(k, v)| (k.clone(), VersionConstraint::parse(v)))
            .collect();
        for pkg in REQUIRED_OS_PACKAGES {
            os.entry(pkg.to_string()).or_insert(VersionConstraint::Any);
        }

        DependencySet {
            os,
            runtime: deps
                .runtime
                .iter()
                .map(|(k, v)| (k.clone(), VersionConstraint::parse(v)))
                .collect(),
            manifest: deps.manifest.clone(),
        }
    }

    /// Hash of the sorted dependency set plus the manifest contents.
    pub fn fingerprint(&self, manifest_contents: Option<&str>) -> String {
        let mut hasher = Sha256::new();

        for (name, c) in &self.os {
            hasher.update(b"os:");
            hasher.update(name.as_bytes());
            hasher.update(b"@");
            hasher.update(c.as_str().as_bytes());
            hasher.update(b";");
        }
        for (name, c) in &self.runtime {
            hasher.update(b"runtime:");
            hasher.update(name.as_bytes());
            hasher.update(b"@");
            hasher.update(c.as_str().as_bytes());
            hasher.update(b";");
        }
        if let Some(contents) = manifest_contents {
            hasher.update(b"manifest:");
            hasher.update(contents.as_bytes());
        }

        hex::encode(hasher.finalize())
    }
}

fn os_package_arg(name: &str, c: &VersionConstraint) -> Result<String> {
    match c {
        VersionConstraint::Any => Ok(name.to_string()),
        VersionConstraint::Exact(v) => Ok(format!("{}={}", name, v)),
        VersionConstraint::Spec(s) => {
            let exact = s.strip_prefix("==").or_else(|| s.strip_prefix('='));
            match exact {
                Some(v) if !v.is_empty() && !v.starts_with('=') => Ok(format!("{}={}", name, v)),
                _ => bail!(
                    "OS package '{}' only accepts an exact version, got '{}'",
                    name,
                    s
                ),
            }
        }
    }
}

fn runtime_package_arg(name: &str, c: &VersionConstraint) -> String {
    match c {
        VersionConstraint::Any => name.to_string(),
        VersionConstraint::Exact(v) => format!("{}=={}", name, v),
        VersionConstraint::Spec(s) => format!("{}{}", name, s),
    }
}

/// Ordered install steps for both tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionPlan {
    pub os: Vec<Step>,
    pub runtime: Vec<Step>,
}

impl ProvisionPlan {
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.os.iter().chain(self.runtime.iter())
    }
}

pub fn plan(deps: &DependencySet) -> Result<ProvisionPlan> {
    let mut install = vec![
        "install".to_string(),
        "-y".to_string(),
        "--no-install-recommends".to_string(),
    ];
    for (name, c) in &deps.os {
        install.push(os_package_arg(name, c)?);
    }

    let os = vec![
        Step::new("Refreshing OS package index", "apt-get", ["update"]),
        Step::new("Installing OS packages", "apt-get", install)
            .with_env("DEBIAN_FRONTEND", "noninteractive"),
        Step::new(
            "Removing OS package caches",
            "sh",
            [
                "-c".to_string(),
                format!("apt-get clean && rm -rf {}/*", APT_LISTS_DIR),
            ],
        ),
    ];

    let mut runtime = Vec::new();
    if let Some(manifest) = &deps.manifest {
        runtime.push(Step::new(
            "Installing runtime manifest",
            "pip",
            ["install", "--no-cache-dir", "-r", manifest.as_str()],
        ));
    }
    if !deps.runtime.is_empty() {
        let mut args = vec!["install".to_string(), "--no-cache-dir".to_string()];
        args.extend(
            deps.runtime
                .iter()
                .map(|(name, c)| runtime_package_arg(name, c)),
        );
        runtime.push(Step::new("Installing runtime libraries", "pip", args));
    }

    Ok(ProvisionPlan { os, runtime })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOutcome {
    pub fingerprint: String,
    pub skipped: bool,
}

fn stamp_path(root: &Path) -> std::path::PathBuf {
    root.join(STATE_DIR).join(DEPS_STAMP_FILE)
}

/// Read the staged runtime manifest from the runtime root.
pub fn read_manifest(deps: &DependencySet, root: &Path) -> Result<Option<String>> {
    match &deps.manifest {
        Some(manifest) => {
            let path = root.join(manifest);
            let contents = fs::read_to_string(&path).with_context(|| {
                format!("Runtime manifest not found in runtime root: {}", path.display())
            })?;
            Ok(Some(contents))
        }
        None => Ok(None),
    }
}

/// Install the dependency set, running every step inside `root`.
///
/// A stamp holding the dependency fingerprint is written on success; a later
/// run with the same fingerprint is skipped unless `force` is set.
pub fn provision(
    deps: &DependencySet,
    root: &Path,
    runner: &mut dyn CommandRunner,
    spinner: &ProgressBar,
    force: bool,
) -> Result<ProvisionOutcome> {
    let manifest = read_manifest(deps, root)?;
    let fingerprint = deps.fingerprint(manifest.as_deref());
    let stamp = stamp_path(root);

    if !force {
        if let Ok(existing) = fs::read_to_string(&stamp) {
            if existing.trim() == fingerprint {
                info!("Dependencies unchanged ({}), skipping", &fingerprint[..12]);
                return Ok(ProvisionOutcome {
                    fingerprint,
                    skipped: true,
                });
            }
        }
    }

    let plan = plan(deps)?;
    for step in plan.steps() {
        spinner.set_message(format!("{}...", step.description));
        info!("{}", step.description);
        runner
            .run(step, root)
            .with_context(|| format!("Provisioning failed: {}", step.description))?;
    }

    if let Some(parent) = stamp.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(&stamp, &fingerprint)
        .with_context(|| format!("Failed to write stamp: {}", stamp.display()))?;

    Ok(ProvisionOutcome {
        fingerprint,
        skipped: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct Recorder {
        seen: Vec<String>,
        fail_on: Option<&'static str>,
    }

    impl CommandRunner for Recorder {
        fn run(&mut self, step: &Step, _cwd: &Path) -> Result<()> {
            self.seen.push(step.description.clone());
            if self.fail_on == Some(step.description.as_str()) {
                return Err(anyhow!("exit status: 100"));
            }
            Ok(())
        }
    }

    fn deps(yaml: &str) -> DependencySet {
        let cfg: DependencyConfig = serde_yaml::from_str(yaml).unwrap();
        DependencySet::from_config(&cfg)
    }

    #[test]
    fn test_constraint_parsing() {
        assert_eq!(VersionConstraint::parse("*"), VersionConstraint::Any);
        assert_eq!(VersionConstraint::parse(" "), VersionConstraint::Any);
        assert_eq!(
            VersionConstraint::parse("3.1.2"),
            VersionConstraint::Exact("3.1.2".to_string())
        );
        assert_eq!(
            VersionConstraint::parse(">=1.30"),
            VersionConstraint::Spec(">=1.30".to_string())
        );
    }

    #[test]
    fn test_required_os_packages_always_present() {
        let d = deps("os: {}\n");
        assert!(d.os.contains_key("build-essential"));
        assert!(d.os.contains_key("curl"));
    }

    #[test]
    fn test_declared_os_version_is_kept() {
        let d = deps("os:\n  curl: \"7.88.1-10\"\n");
        assert_eq!(
            d.os.get("curl"),
            Some(&VersionConstraint::Exact("7.88.1-10".to_string()))
        );
    }

    #[test]
    fn test_plan_orders_os_before_runtime() {
        let d = deps("runtime:\n  streamlit: \">=1.30\"\n  openpyxl: \"3.1.2\"\n");
        let p = plan(&d).unwrap();
        let programs: Vec<&str> = p.steps().map(|s| s.program.as_str()).collect();
        assert_eq!(programs, vec!["apt-get", "apt-get", "sh", "pip", "pip"]);

        assert_eq!(
            p.os[1].args,
            vec!["install", "-y", "--no-install-recommends", "build-essential", "curl"]
        );
        assert!(p.os[2].args[1].contains("/var/lib/apt/lists/*"));
        assert_eq!(
            p.runtime[0].args,
            vec!["install", "--no-cache-dir", "-r", "requirements.txt"]
        );
        assert_eq!(
            p.runtime[1].args,
            vec!["install", "--no-cache-dir", "openpyxl==3.1.2", "streamlit>=1.30"]
        );
    }

    #[test]
    fn test_plan_without_runtime_tier() {
        let d = deps("manifest: ~\n");
        let p = plan(&d).unwrap();
        assert!(p.runtime.is_empty());
    }

    #[test]
    fn test_os_range_is_rejected() {
        let d = deps("os:\n  curl: \">=7\"\n");
        assert!(plan(&d).is_err());

        let d = deps("os:\n  curl: \"==7.88\"\n");
        assert!(plan(&d).unwrap().os[1].args.contains(&"curl=7.88".to_string()));
    }

    #[test]
    fn test_fingerprint_tracks_manifest_and_versions() {
        let a = deps("runtime:\n  pandas: \"2.2.0\"\n");
        let b = deps("runtime:\n  pandas: \"2.2.1\"\n");
        assert_ne!(a.fingerprint(None), b.fingerprint(None));
        assert_ne!(a.fingerprint(Some("x")), a.fingerprint(Some("y")));
        assert_eq!(a.fingerprint(Some("x")), a.fingerprint(Some("x")));
        assert_eq!(a.fingerprint(None).len(), 64);
    }

    #[test]
    fn test_provision_runs_all_steps_and_stamps() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("requirements.txt"), "streamlit\n").unwrap();
        let d = deps("{}");
        let mut rec = Recorder { seen: Vec::new(), fail_on: None };

        let out = provision(&d, root.path(), &mut rec, &ProgressBar::hidden(), false).unwrap();
        assert!(!out.skipped);
        assert_eq!(rec.seen.len(), 4);
        let stamp = fs::read_to_string(stamp_path(root.path())).unwrap();
        assert_eq!(stamp, out.fingerprint);

        // Same inputs: skipped.
        let mut rec2 = Recorder { seen: Vec::new(), fail_on: None };
        let out2 = provision(&d, root.path(), &mut rec2, &ProgressBar::hidden(), false).unwrap();
        assert!(out2.skipped);
        assert!(rec2.seen.is_empty());

        // Forced: runs again.
        let out3 = provision(&d, root.path(), &mut rec2, &ProgressBar::hidden(), true).unwrap();
        assert!(!out3.skipped);
        assert_eq!(rec2.seen.len(), 4);
    }

    #[test]
    fn test_provision_failure_is_fatal_and_unstamped() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("requirements.txt"), "streamlit\n").unwrap();
        let d = deps("{}");
        let mut rec = Recorder {
            seen: Vec::new(),
            fail_on: Some("Installing OS packages"),
        };

        let err = provision(&d, root.path(), &mut rec, &ProgressBar::hidden(), false).unwrap_err();
        assert!(format!("{:#}", err).contains("Installing OS packages"));
        assert_eq!(rec.seen.len(), 2, "nothing runs after the failing step");
        assert!(!stamp_path(root.path()).exists());
    }

    #[test]
    fn test_missing_manifest_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let d = deps("{}");
        let mut rec = Recorder { seen: Vec::new(), fail_on: None };
        assert!(provision(&d, root.path(), &mut rec, &ProgressBar::hidden(), false).is_err());
        assert!(rec.seen.is_empty());
    }
}
