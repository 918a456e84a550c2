use anyhow::Result;
use log::info;
use std::path::Path;

use crate::config::Config;
use crate::{bootstrap, payload};

pub fn run(config: &Config, target: Option<&str>, root: &Path) -> Result<()> {
    let target = super::select_target(target, root)?;
    let profile = super::resolve_profile(config, target.as_deref())?;

    // Missing files only warn here; the app reports them itself on start.
    payload::enforce(&payload::verify(config, root), false)?;

    let plan = bootstrap::plan(config, &profile, root);
    info!(
        "Launching {} for target '{}' on {}:{}",
        config.app, profile.target, profile.bind_address, profile.port
    );

    let code = bootstrap::exec(&plan)?;
    std::process::exit(code);
}
