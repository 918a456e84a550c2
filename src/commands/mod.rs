mod build;
mod check;
mod init;
mod launch;
mod materialize;
mod probe;
mod provision;
mod render;
mod targets;

pub use build::run as build;
pub use check::run as check;
pub use init::run as init;
pub use launch::run as launch;
pub use materialize::run as materialize;
pub use probe::run as probe;
pub use provision::run as provision;
pub use render::run as render;
pub use targets::run as targets;

use anyhow::Result;
use log::{info, warn};
use std::path::Path;

use crate::config::Config;
use crate::profile::{self, LaunchProfile};
use crate::record::BuildRecord;

/// Target named on the command line (or in the environment), else the one
/// recorded at build time. `None` means the canonical target.
pub fn select_target(explicit: Option<&str>, root: &Path) -> Result<Option<String>> {
    if let Some(target) = explicit {
        return Ok(Some(target.to_string()));
    }
    Ok(BuildRecord::read(root)?.and_then(|r| r.target))
}

/// Resolve a profile, logging its proxy assumption and any unsafe settings.
pub fn resolve_profile(config: &Config, target: Option<&str>) -> Result<LaunchProfile> {
    let profile = profile::resolve(target, &config.targets)?;
    if let Some(assumption) = profile.origin_policy.assumption() {
        info!("[{}] {}", profile.target, assumption);
    }
    for finding in profile.findings() {
        warn!("[{}] unsafe profile: {}", profile.target, finding);
    }
    Ok(profile)
}
