use anyhow::Result;
use chrono::Utc;
use indicatif::ProgressBar;
use log::info;
use std::path::Path;

use crate::config::Config;
use crate::provision::{self, DependencySet};
use crate::record::BuildRecord;
use crate::runner::{CommandRunner, SystemRunner};
use crate::{payload, ui};

pub fn run(
    config: &Config,
    context: &Path,
    root: &Path,
    target: Option<&str>,
    force: bool,
) -> Result<()> {
    ui::print_step(&format!(
        "Building {} from {} into {}",
        config.app,
        context.display(),
        root.display()
    ));

    let spinner = ui::create_spinner("Building");
    let result = build_into(config, context, root, target, &mut SystemRunner, &spinner, force);
    spinner.finish_and_clear();
    let record = result?;

    ui::print_success(&format!(
        "Built {} for target '{}' (dependencies {})",
        record.app,
        record.target.as_deref().unwrap_or("default"),
        &record.dependency_fingerprint[..12]
    ));
    Ok(())
}

/// Every phase runs to completion before the next starts: manifests are
/// staged and resolved while the root holds nothing else from the payload.
fn build_into(
    config: &Config,
    context: &Path,
    root: &Path,
    target: Option<&str>,
    runner: &mut dyn CommandRunner,
    spinner: &ProgressBar,
    force: bool,
) -> Result<BuildRecord> {
    // An unknown target must fail before anything is installed.
    let target = match target {
        Some(t) => Some(super::resolve_profile(config, Some(t))?.target),
        None => None,
    };

    spinner.set_message("Clearing previous payload...");
    payload::clear_root(context, root)?;

    spinner.set_message("Staging dependency manifests...");
    payload::stage_manifests(config, context, root)?;

    let deps = DependencySet::from_config(&config.dependencies);
    let outcome = provision::provision(&deps, root, runner, spinner, force)?;

    spinner.set_message("Copying payload...");
    let summary = payload::materialize(context, root)?;
    info!("Copied {} files ({} bytes)", summary.files, summary.bytes);

    let report = payload::verify(config, root);
    payload::enforce(&report, config.payload.strict)?;

    let record = BuildRecord {
        app: config.app.clone(),
        target,
        dependency_fingerprint: outcome.fingerprint,
        data_artifact: report.data_artifact,
        built_at: Utc::now(),
    };
    record.write(root)?;
    Ok(record)
}
