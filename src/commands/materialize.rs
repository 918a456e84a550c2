use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::{payload, ui};

pub fn run(config: &Config, context: &Path, root: &Path) -> Result<()> {
    ui::print_step(&format!(
        "Materializing payload from {} into {}",
        context.display(),
        root.display()
    ));

    payload::clear_root(context, root)?;
    let summary = payload::materialize(context, root)?;
    let report = payload::verify(config, root);
    payload::enforce(&report, config.payload.strict)?;

    ui::print_success(&format!(
        "Copied {} files ({} bytes); workbook: {}",
        summary.files,
        summary.bytes,
        report.data_artifact.as_deref().unwrap_or("none")
    ));
    Ok(())
}
