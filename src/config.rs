use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::constants::*;
use crate::profile::OriginPolicy;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub app: String,
    #[serde(default = "default_entrypoint")]
    pub entrypoint: String,
    #[serde(default = "default_data_artifacts")]
    pub data_artifacts: Vec<String>,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub dependencies: DependencyConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub payload: PayloadConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub targets: BTreeMap<String, TargetOverride>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageConfig {
    #[serde(default = "default_base_image")]
    pub base: String,
    #[serde(default = "default_app_root")]
    pub root: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        ImageConfig {
            base: default_base_image(),
            root: default_app_root(),
        }
    }
}

/// Declared dependency set, split into OS and runtime tiers.
/// Values are version constraints; `*` or an empty string means any.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependencyConfig {
    #[serde(default)]
    pub os: BTreeMap<String, String>,
    #[serde(default)]
    pub runtime: BTreeMap<String, String>,
    /// Runtime manifest file, relative to the build context
    #[serde(default = "default_manifest")]
    pub manifest: Option<String>,
}

impl Default for DependencyConfig {
    fn default() -> Self {
        DependencyConfig {
            os: BTreeMap::new(),
            runtime: BTreeMap::new(),
            manifest: default_manifest(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Program and leading arguments; the entrypoint and flags follow
    #[serde(default = "default_runtime_command")]
    pub command: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            command: default_runtime_command(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PayloadConfig {
    /// Fail the build when required payload files are missing
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_start_period")]
    pub start_period_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            interval_secs: default_interval(),
            timeout_secs: default_timeout(),
            start_period_secs: default_start_period(),
            retries: default_retries(),
        }
    }
}

impl HealthConfig {
    /// Zero values make every health check time out immediately and leave the
    /// container host to substitute its own defaults.
    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("interval_secs", self.interval_secs),
            ("timeout_secs", self.timeout_secs),
            ("retries", u64::from(self.retries)),
        ] {
            if value == 0 {
                anyhow::bail!("health.{} must be greater than zero", field);
            }
        }
        Ok(())
    }
}

/// Operator-declared deployment target layered over a built-in one.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct TargetOverride {
    pub base: Option<String>,
    pub description: Option<String>,
    pub port: Option<u16>,
    pub bind_address: Option<String>,
    pub headless: Option<bool>,
    pub telemetry_opt_out: Option<bool>,
    pub origin_policy: Option<OriginPolicy>,
    pub cors_enabled: Option<bool>,
    pub xsrf_protection_enabled: Option<bool>,
    pub health_check: Option<bool>,
}

fn default_entrypoint() -> String {
    DEFAULT_ENTRYPOINT.to_string()
}

fn default_data_artifacts() -> Vec<String> {
    DEFAULT_DATA_ARTIFACTS.iter().map(|s| s.to_string()).collect()
}

fn default_base_image() -> String {
    DEFAULT_BASE_IMAGE.to_string()
}

fn default_app_root() -> String {
    DEFAULT_APP_ROOT.to_string()
}

fn default_manifest() -> Option<String> {
    Some(DEFAULT_RUNTIME_MANIFEST.to_string())
}

fn default_runtime_command() -> Vec<String> {
    vec!["streamlit".to_string(), "run".to_string()]
}

fn default_interval() -> u64 {
    30
}

fn default_timeout() -> u64 {
    PROBE_TIMEOUT_SECS
}

fn default_start_period() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config =
            serde_yaml::from_str(content).with_context(|| "Failed to parse YAML config")?;
        if config.runtime.command.is_empty() {
            anyhow::bail!("runtime.command must name at least the program to run");
        }
        config.health.validate()?;
        Ok(config)
    }
}
