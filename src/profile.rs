//! Launch profile selection.
//!
//! Every deployment target resolves through one policy table. Operators can
//! layer extra targets over a built-in row from the config file; those are
//! validated here and checked for unsafe security toggles.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use thiserror::Error;

use crate::config::TargetOverride;
use crate::constants::*;

/// How the app treats cross-origin requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OriginPolicy {
    /// CORS and XSRF protection stay on.
    Enforced,
    /// TLS termination and origin rewriting happen in a reverse proxy
    /// upstream. The framework's origin check misreads proxied requests as
    /// cross-origin, so both protections are turned off together.
    TrustedProxy,
}

impl OriginPolicy {
    pub fn protections_enabled(self) -> bool {
        matches!(self, OriginPolicy::Enforced)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OriginPolicy::Enforced => "enforced",
            OriginPolicy::TrustedProxy => "trusted-proxy",
        }
    }

    /// Operator-facing statement of what the policy assumes.
    pub fn assumption(self) -> Option<&'static str> {
        match self {
            OriginPolicy::Enforced => None,
            OriginPolicy::TrustedProxy => Some(
                "trusted-proxy mode: a reverse proxy terminates TLS and rewrites origins upstream; \
                 CORS and XSRF checks are disabled as a workaround for that topology only",
            ),
        }
    }
}

impl fmt::Display for OriginPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the built-in policy table.
#[derive(Debug, Clone, Copy)]
pub struct TargetSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub port: u16,
    pub headless: bool,
    pub telemetry_opt_out: bool,
    pub origin_policy: OriginPolicy,
    pub health_check: bool,
}

pub static BUILTIN_TARGETS: [TargetSpec; 5] = [
    TargetSpec {
        name: CANONICAL_TARGET,
        description: "Bare container host, headless",
        port: DEFAULT_PORT,
        headless: true,
        telemetry_opt_out: true,
        origin_policy: OriginPolicy::Enforced,
        health_check: true,
    },
    TargetSpec {
        name: "generic-host-alt-port",
        description: "Bare container host on the alternate port",
        port: ALTERNATE_PORT,
        headless: true,
        telemetry_opt_out: true,
        origin_policy: OriginPolicy::TrustedProxy,
        health_check: false,
    },
    TargetSpec {
        name: "panel-host-a",
        description: "Hosting panel that requires disabled origin checks",
        port: DEFAULT_PORT,
        headless: false,
        telemetry_opt_out: false,
        origin_policy: OriginPolicy::TrustedProxy,
        health_check: false,
    },
    TargetSpec {
        name: "panel-host-b",
        description: "Hosting panel, headless with disabled origin checks",
        port: DEFAULT_PORT,
        headless: true,
        telemetry_opt_out: true,
        origin_policy: OriginPolicy::TrustedProxy,
        health_check: false,
    },
    TargetSpec {
        name: "self-hosted",
        description: "Self-hosted platform with health monitoring",
        port: DEFAULT_PORT,
        headless: false,
        telemetry_opt_out: false,
        origin_policy: OriginPolicy::Enforced,
        health_check: true,
    },
];

pub fn builtin(name: &str) -> Option<&'static TargetSpec> {
    BUILTIN_TARGETS.iter().find(|t| t.name == name)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("unknown deployment target '{name}' (known targets: {known})")]
    UnknownTarget { name: String, known: String },
    #[error("target '{target}' is based on unknown built-in target '{base}'")]
    UnknownBase { target: String, base: String },
    #[error("target '{0}' is already defined by the built-in policy table")]
    ShadowsBuiltin(String),
    #[error("target '{0}': port must be between 1 and 65535")]
    InvalidPort(String),
    #[error("target '{target}': bind address '{address}' is not a wildcard address")]
    NonWildcardBind { target: String, address: String },
}

/// Resolved runtime flags for one deployment target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchProfile {
    pub target: String,
    pub port: u16,
    pub bind_address: String,
    pub headless: bool,
    pub telemetry_opt_out: bool,
    pub cors_enabled: bool,
    pub xsrf_protection_enabled: bool,
    pub origin_policy: OriginPolicy,
    pub health_check: bool,
}

/// A security problem with a resolved profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// A protection is off but no trusted proxy is declared in front.
    UnprotectedOrigin { cors_enabled: bool, xsrf_protection_enabled: bool },
    /// CORS and XSRF protection disagree.
    AsymmetricProtection { cors_enabled: bool, xsrf_protection_enabled: bool },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::UnprotectedOrigin {
                cors_enabled,
                xsrf_protection_enabled,
            } => write!(
                f,
                "origin protections disabled without a trusted proxy (cors={}, xsrf={})",
                cors_enabled, xsrf_protection_enabled
            ),
            Finding::AsymmetricProtection {
                cors_enabled,
                xsrf_protection_enabled,
            } => write!(
                f,
                "CORS and XSRF protection disagree (cors={}, xsrf={})",
                cors_enabled, xsrf_protection_enabled
            ),
        }
    }
}

impl LaunchProfile {
    fn from_spec(name: &str, spec: &TargetSpec) -> Self {
        let protected = spec.origin_policy.protections_enabled();
        LaunchProfile {
            target: name.to_string(),
            port: spec.port,
            bind_address: WILDCARD_ADDRESS.to_string(),
            headless: spec.headless,
            telemetry_opt_out: spec.telemetry_opt_out,
            cors_enabled: protected,
            xsrf_protection_enabled: protected,
            origin_policy: spec.origin_policy,
            health_check: spec.health_check,
        }
    }

    pub fn findings(&self) -> Vec<Finding> {
        let mut findings = Vec::new();
        let any_disabled = !self.cors_enabled || !self.xsrf_protection_enabled;

        if any_disabled && self.origin_policy != OriginPolicy::TrustedProxy {
            findings.push(Finding::UnprotectedOrigin {
                cors_enabled: self.cors_enabled,
                xsrf_protection_enabled: self.xsrf_protection_enabled,
            });
        }
        if self.cors_enabled != self.xsrf_protection_enabled {
            findings.push(Finding::AsymmetricProtection {
                cors_enabled: self.cors_enabled,
                xsrf_protection_enabled: self.xsrf_protection_enabled,
            });
        }

        findings
    }
}

/// Every target name the selector accepts, built-ins first.
pub fn known_targets(custom: &BTreeMap<String, TargetOverride>) -> Vec<String> {
    BUILTIN_TARGETS
        .iter()
        .map(|t| t.name.to_string())
        .chain(custom.keys().cloned())
        .collect()
}

/// Resolve a deployment target to its launch profile.
///
/// `None` selects the canonical target. Any other unrecognized name is an
/// error; there is no fallback.
pub fn resolve(
    name: Option<&str>,
    custom: &BTreeMap<String, TargetOverride>,
) -> Result<LaunchProfile, ProfileError> {
    let name = name.unwrap_or(CANONICAL_TARGET);

    if let Some(spec) = builtin(name) {
        if custom.contains_key(name) {
            return Err(ProfileError::ShadowsBuiltin(name.to_string()));
        }
        return Ok(LaunchProfile::from_spec(name, spec));
    }

    match custom.get(name) {
        Some(over) => resolve_custom(name, over),
        None => Err(ProfileError::UnknownTarget {
            name: name.to_string(),
            known: known_targets(custom).join(", "),
        }),
    }
}

fn resolve_custom(name: &str, over: &TargetOverride) -> Result<LaunchProfile, ProfileError> {
    let base_name = over.base.as_deref().unwrap_or(CANONICAL_TARGET);
    let base = builtin(base_name).ok_or_else(|| ProfileError::UnknownBase {
        target: name.to_string(),
        base: base_name.to_string(),
    })?;

    let mut profile = LaunchProfile::from_spec(name, base);

    if let Some(port) = over.port {
        if port == 0 {
            return Err(ProfileError::InvalidPort(name.to_string()));
        }
        profile.port = port;
    }

    if let Some(address) = &over.bind_address {
        let wildcard = address
            .parse::<IpAddr>()
            .map(|ip| ip.is_unspecified())
            .unwrap_or(false);
        if !wildcard {
            return Err(ProfileError::NonWildcardBind {
                target: name.to_string(),
                address: address.clone(),
            });
        }
        profile.bind_address = address.clone();
    }

    if let Some(policy) = over.origin_policy {
        profile.origin_policy = policy;
        profile.cors_enabled = policy.protections_enabled();
        profile.xsrf_protection_enabled = policy.protections_enabled();
    }

    // Raw toggles win over the policy; findings() reports the result.
    if let Some(cors) = over.cors_enabled {
        profile.cors_enabled = cors;
    }
    if let Some(xsrf) = over.xsrf_protection_enabled {
        profile.xsrf_protection_enabled = xsrf;
    }
    if let Some(headless) = over.headless {
        profile.headless = headless;
    }
    if let Some(opt_out) = over.telemetry_opt_out {
        profile.telemetry_opt_out = opt_out;
    }
    if let Some(health) = over.health_check {
        profile.health_check = health;
    }

    Ok(profile)
}
