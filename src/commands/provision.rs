use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::provision::{self, DependencySet};
use crate::runner::SystemRunner;
use crate::ui;

pub fn run(config: &Config, root: &Path, force: bool) -> Result<()> {
    let deps = DependencySet::from_config(&config.dependencies);
    ui::print_step(&format!(
        "Provisioning {} OS and {} runtime dependencies in {}",
        deps.os.len(),
        deps.runtime.len(),
        root.display()
    ));

    let spinner = ui::create_spinner("Installing dependencies");
    let outcome = provision::provision(&deps, root, &mut SystemRunner, &spinner, force);
    spinner.finish_and_clear();
    let outcome = outcome?;

    if outcome.skipped {
        ui::print_success("Dependencies already provisioned");
    } else {
        ui::print_success(&format!(
            "Dependencies provisioned ({})",
            &outcome.fingerprint[..12]
        ));
    }
    Ok(())
}
