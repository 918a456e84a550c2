use anyhow::{Context, Result};
use std::path::Path;

use crate::config::Config;
use crate::{container, ui};

pub fn run(config: &Config, target: Option<&str>, output: Option<&Path>) -> Result<()> {
    let profile = super::resolve_profile(config, target)?;
    let dockerfile = container::render(config, &profile)?;

    match output {
        Some(path) => {
            std::fs::write(path, &dockerfile)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            ui::print_success(&format!(
                "Rendered container definition for '{}' to {}",
                profile.target,
                path.display()
            ));
        }
        None => print!("{}", dockerfile),
    }
    Ok(())
}
