//! Process bootstrap.
//!
//! The application replaces this process, so signals from the orchestrator
//! reach it directly and its exit code becomes the container's. There is no
//! retry or restart here.

use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::Config;
use crate::profile::LaunchProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdinMode {
    Inherit,
    /// Reads see end-of-file immediately.
    Null,
}

/// Fully resolved command line for the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: PathBuf,
    pub stdin: StdinMode,
}

/// Framework flags for a profile, all six set explicitly.
pub fn start_flags(profile: &LaunchProfile) -> Vec<String> {
    vec![
        format!("--server.port={}", profile.port),
        format!("--server.address={}", profile.bind_address),
        format!("--server.headless={}", profile.headless),
        format!("--browser.gatherUsageStats={}", !profile.telemetry_opt_out),
        format!("--server.enableCORS={}", profile.cors_enabled),
        format!("--server.enableXsrfProtection={}", profile.xsrf_protection_enabled),
    ]
}

pub fn plan(config: &Config, profile: &LaunchProfile, workdir: &Path) -> LaunchPlan {
    let (program, leading) = config
        .runtime
        .command
        .split_first()
        .map(|(p, rest)| (p.clone(), rest.to_vec()))
        .unwrap_or_default();

    let mut args = leading;
    args.push(config.entrypoint.clone());
    args.extend(start_flags(profile));

    LaunchPlan {
        program,
        args,
        workdir: workdir.to_path_buf(),
        stdin: if profile.headless {
            StdinMode::Null
        } else {
            StdinMode::Inherit
        },
    }
}

impl LaunchPlan {
    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(&self.workdir);
        if self.stdin == StdinMode::Null {
            cmd.stdin(Stdio::null());
        }
        cmd
    }
}

/// Replace the current process with the application.
///
/// Only returns on Unix if the exec itself failed.
#[cfg(unix)]
pub fn exec(plan: &LaunchPlan) -> Result<i32> {
    use std::os::unix::process::CommandExt;

    info!("Exec {} in {}", plan.program, plan.workdir.display());
    let err = plan.command().exec();
    Err(err).with_context(|| format!("Failed to exec {}", plan.program))
}

/// Run the application to completion and hand back its exit code.
#[cfg(not(unix))]
pub fn exec(plan: &LaunchPlan) -> Result<i32> {
    info!("Running {} in {}", plan.program, plan.workdir.display());
    let status = plan
        .command()
        .status()
        .with_context(|| format!("Failed to start {}", plan.program))?;
    Ok(status.code().unwrap_or(1))
}
