use anyhow::{Result, bail};

use crate::bootstrap;
use crate::config::Config;
use crate::profile::LaunchProfile;
use crate::ui;

pub fn run(config: &Config, target: Option<&str>, strict: bool, json: bool) -> Result<()> {
    let profile = super::resolve_profile(config, target)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return fail_if_unsafe(&profile, strict);
    }

    ui::print_step(&format!("Launch profile for target '{}'", profile.target));
    println!("  port:                   {}", profile.port);
    println!("  bind address:           {}", profile.bind_address);
    println!("  headless:               {}", profile.headless);
    println!("  telemetry opt-out:      {}", profile.telemetry_opt_out);
    println!("  CORS enabled:           {}", profile.cors_enabled);
    println!("  XSRF protection:        {}", profile.xsrf_protection_enabled);
    println!("  origin policy:          {}", profile.origin_policy);
    println!(
        "  health check:           {}",
        if profile.health_check {
            "wired"
        } else {
            "absent (process exit and port reachability only)"
        }
    );
    println!("  flags:                  {}", bootstrap::start_flags(&profile).join(" "));

    if let Some(assumption) = profile.origin_policy.assumption() {
        ui::print_warning(assumption);
    }

    let findings = profile.findings();
    if findings.is_empty() {
        ui::print_success("Profile is consistent");
        return Ok(());
    }

    for finding in &findings {
        ui::print_warning(&finding.to_string());
    }
    fail_if_unsafe(&profile, strict)
}

fn fail_if_unsafe(profile: &LaunchProfile, strict: bool) -> Result<()> {
    let count = profile.findings().len();
    if strict && count > 0 {
        bail!("Target '{}' has {} unsafe setting(s)", profile.target, count);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RISKY: &str = r#"
app: x
targets:
  risky:
    cors_enabled: false
    xsrf_protection_enabled: false
"#;

    #[test]
    fn test_strict_check_fails_on_unsafe_target() {
        let config = Config::parse(RISKY).unwrap();
        assert!(run(&config, Some("risky"), false, false).is_ok());
        assert!(run(&config, Some("risky"), true, false).is_err());
        assert!(run(&config, Some("risky"), true, true).is_err());
    }

    #[test]
    fn test_builtin_targets_pass_strict_check() {
        let config = Config::parse("app: x\n").unwrap();
        for name in ["generic-host", "panel-host-a", "self-hosted"] {
            assert!(run(&config, Some(name), true, false).is_ok(), "{}", name);
        }
    }
}
