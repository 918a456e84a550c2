use anyhow::{Result, bail};
use std::path::Path;
use std::time::Duration;

use crate::config::Config;
use crate::health::{HealthStatus, Prober};
use crate::profile::LaunchProfile;
use crate::ui;

pub fn run(config: &Config, target: Option<&str>, host: &str, root: &Path) -> Result<()> {
    let target = super::select_target(target, root)?;
    let profile = super::resolve_profile(config, target.as_deref())?;
    let prober = Prober::new(Duration::from_secs(config.health.timeout_secs))?;

    let status = check(&prober, &profile, host);
    if status.is_healthy() {
        ui::print_success(&format!("{}:{} is {}", host, profile.port, status));
        Ok(())
    } else {
        bail!("{}:{} is {}", host, profile.port, status)
    }
}

fn check(prober: &Prober, profile: &LaunchProfile, host: &str) -> HealthStatus {
    if profile.health_check {
        return prober.probe_endpoint(host, profile.port);
    }
    ui::print_warning(&format!(
        "Target '{}' has no health check wired; only checking that the port accepts connections",
        profile.target
    ));
    prober.probe_port(host, profile.port)
}
