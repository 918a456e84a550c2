use anyhow::{Context, Result, bail};
use std::path::Path;

use crate::ui;

/// Template configuration with comments
const CONFIG_TEMPLATE: &str = r#"# dashboot configuration file

# Application name (required)
app: prazo-custo

# Script the dashboard framework runs (optional, default: app.py)
entrypoint: app.py

# Workbook the app reads; the first one present wins (optional)
data_artifacts:
  - Excel.xlsm
  - Excel.xlsx
  - excel.xlsm
  - excel.xlsx

# Container image settings (optional)
image:
  base: python:3.11-slim
  root: /app

# Dependencies (optional)
# build-essential and curl are always installed in the OS tier.
dependencies:
  os: {}
  #   libgomp1: "*"
  runtime:
    streamlit: ">=1.30"
    pandas: "*"
    plotly: "*"
    openpyxl: "*"
  # Runtime manifest resolved before the payload is copied (set to ~ to disable)
  manifest: requirements.txt

# Command that serves the app; the entrypoint and flags are appended (optional)
runtime:
  command: [streamlit, run]

# Fail the build when the entrypoint or workbook is missing (optional, default: false)
payload:
  strict: false

# Health check timing for targets that wire one (optional)
health:
  interval_secs: 30
  timeout_secs: 5
  start_period_secs: 30
  retries: 3

# Extra deployment targets layered over a built-in one (optional)
# Built-in: generic-host, generic-host-alt-port, panel-host-a, panel-host-b, self-hosted
targets: {}
#  staging:
#    base: self-hosted
#    port: 9000
#    # Only when a reverse proxy terminates TLS and rewrites origins upstream
#    origin_policy: trusted-proxy
"#;

pub fn run(config_path: &Path) -> Result<()> {
    if config_path.exists() {
        ui::print_step("Use a different path with --config or remove the existing file");
        bail!(
            "Configuration file already exists at: {}",
            config_path.display()
        );
    }

    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }

    std::fs::write(config_path, CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

    ui::print_success(&format!(
        "Created configuration file at: {}",
        config_path.display()
    ));
    ui::print_step("Edit the file to describe your dashboard and its dependencies");

    Ok(())
}
