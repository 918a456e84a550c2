//! Container definition rendering.
//!
//! One Dockerfile per target, rendered from the same provisioning plan,
//! launch plan and profile the local commands use. The exposed port and the
//! bound port come from the same profile field.

use anyhow::Result;
use std::path::Path;

use crate::bootstrap;
use crate::config::{Config, HealthConfig};
use crate::health;
use crate::profile::LaunchProfile;
use crate::provision::{self, DependencySet};
use crate::runner::Step;

fn run_line(steps: &[Step]) -> String {
    let lines: Vec<String> = steps.iter().map(Step::shell_line).collect();
    format!("RUN {}\n", lines.join(" \\\n    && "))
}

fn exec_form(argv: &[String]) -> Result<String> {
    Ok(serde_json::to_string(argv)?)
}

fn healthcheck_line(health: &HealthConfig, port: u16) -> Result<String> {
    Ok(format!(
        "HEALTHCHECK --interval={}s --timeout={}s --start-period={}s --retries={} \\\n    CMD {}\n",
        health.interval_secs,
        health.timeout_secs,
        health.start_period_secs,
        health.retries,
        exec_form(&health::check_command(port))?
    ))
}

pub fn render(config: &Config, profile: &LaunchProfile) -> Result<String> {
    let deps = DependencySet::from_config(&config.dependencies);
    let plan = provision::plan(&deps)?;
    let root = Path::new(&config.image.root);
    let launch = bootstrap::plan(config, profile, root);

    let mut out = String::new();
    out.push_str(&format!(
        "# Generated by dashboot for target '{}'. Do not edit by hand.\n",
        profile.target
    ));
    if let Some(assumption) = profile.origin_policy.assumption() {
        out.push_str(&format!("# {}\n", assumption));
    }
    out.push_str(&format!("FROM {}\n\n", config.image.base));
    out.push_str(&format!("WORKDIR {}\n\n", config.image.root));

    out.push_str("# OS tier\n");
    out.push_str(&run_line(&plan.os));
    out.push('\n');

    // Manifest before payload: payload edits must not invalidate this layer.
    out.push_str("# Runtime tier\n");
    if let Some(manifest) = &config.dependencies.manifest {
        out.push_str(&format!("COPY {} ./{}\n", manifest, manifest));
    }
    if !plan.runtime.is_empty() {
        out.push_str(&run_line(&plan.runtime));
    }
    out.push('\n');

    out.push_str("# Payload: source tree and workbook\n");
    out.push_str("COPY . .\n\n");

    out.push_str(&format!("EXPOSE {}\n", profile.port));
    if profile.health_check {
        out.push_str(&healthcheck_line(&config.health, profile.port)?);
    } else {
        out.push_str(
            "# No health check: the host only sees process exit and port reachability.\n",
        );
    }
    out.push_str(&format!("CMD {}\n", exec_form(&launch.argv())?));

    Ok(out)
}
