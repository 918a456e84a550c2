use anyhow::Result;
use colored::*;
use std::collections::BTreeMap;

use crate::config::TargetOverride;
use crate::profile::{self, LaunchProfile};
use crate::ui;

pub fn run(custom: &BTreeMap<String, TargetOverride>) -> Result<()> {
    ui::print_step("Deployment targets");
    println!();
    println!(
        "  {:<24} {:>5}  {:<8} {:<9} {:<14} {:<7} {}",
        "TARGET", "PORT", "HEADLESS", "TELEMETRY", "ORIGIN", "HEALTH", "DESCRIPTION"
    );

    for name in profile::known_targets(custom) {
        let description = match profile::builtin(&name) {
            Some(spec) => spec.description.to_string(),
            None => custom
                .get(&name)
                .and_then(|t| t.description.clone())
                .unwrap_or_else(|| "custom".to_string()),
        };

        match profile::resolve(Some(&name), custom) {
            Ok(p) => println!("  {}", row(&p, &description)),
            Err(e) => println!("  {:<24} {}", name, e.to_string().red()),
        }
    }

    println!();
    Ok(())
}

fn row(p: &LaunchProfile, description: &str) -> String {
    let line = format!(
        "{:<24} {:>5}  {:<8} {:<9} {:<14} {:<7} {}",
        p.target,
        p.port,
        yes_no(p.headless),
        if p.telemetry_opt_out { "off" } else { "on" },
        p.origin_policy.as_str(),
        if p.health_check { "probe" } else { "-" },
        description
    );
    if p.findings().is_empty() {
        line
    } else {
        line.yellow().to_string()
    }
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}
