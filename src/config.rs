//! Environment-driven configuration.
//!
//! One webhook instance enforces one policy; everything that varies per
//! deployment (policy selection, exemptions, compliant target values, TLS
//! material paths) is read from the environment once at startup rather than
//! compiled in.

use std::collections::BTreeSet;
use std::env;
use std::fmt::Display;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::policies::{Mode, Targets};
use crate::webhooks::{WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH};

/// Namespace exempted in every deployment.
pub const DEFAULT_EXEMPT_NAMESPACE: &str = "kube-system";

/// Resolved startup configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Policy name, resolved against the registry at startup.
    pub policy: String,
    /// Mode override; `None` uses the rule's default mode.
    pub mode: Option<Mode>,
    /// Namespaces that short-circuit to allow before any evaluation.
    pub exempt_namespaces: BTreeSet<String>,
    /// Compliant target values for rules that carry one.
    pub targets: Targets,
    /// TLS certificate path (PEM).
    pub cert_path: String,
    /// TLS private key path (PEM).
    pub key_path: String,
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// `POLICY` is required; `MODE`, `EXEMPT_NAMESPACES`, `MIN_REPLICAS`,
    /// `RUN_AS_USER`, `TLS_CERT_FILE` and `TLS_KEY_FILE` are optional.
    /// `POD_NAMESPACE` (the webhook's own namespace, injected via the
    /// downward API) is always added to the exemption set so the webhook
    /// never blocks its own workloads.
    pub fn from_env() -> Result<Self> {
        let policy = env::var("POLICY").map_err(|_| {
            Error::Config("POLICY must be set to the policy this instance enforces".to_string())
        })?;

        let mode = match env::var("MODE") {
            Ok(raw) => Some(raw.parse()?),
            Err(_) => None,
        };

        let targets = Targets {
            min_replicas: parse_var("MIN_REPLICAS", Targets::default().min_replicas)?,
            run_as_user: parse_var("RUN_AS_USER", Targets::default().run_as_user)?,
        };
        if targets.min_replicas < 1 {
            return Err(Error::Config(format!(
                "MIN_REPLICAS must be at least 1 (got {})",
                targets.min_replicas
            )));
        }
        if targets.run_as_user == 0 {
            return Err(Error::Config(
                "RUN_AS_USER must be non-zero; uid 0 is root".to_string(),
            ));
        }

        Ok(Self {
            policy,
            mode,
            exempt_namespaces: exempt_namespaces(
                env::var("EXEMPT_NAMESPACES").ok().as_deref(),
                env::var("POD_NAMESPACE").ok().as_deref(),
            ),
            targets,
            cert_path: env::var("TLS_CERT_FILE").unwrap_or_else(|_| WEBHOOK_CERT_PATH.to_string()),
            key_path: env::var("TLS_KEY_FILE").unwrap_or_else(|_| WEBHOOK_KEY_PATH.to_string()),
        })
    }
}

/// Build the exemption set: the fixed default, the webhook's own namespace,
/// and any comma-separated extras.
fn exempt_namespaces(configured: Option<&str>, own_namespace: Option<&str>) -> BTreeSet<String> {
    let mut namespaces = BTreeSet::new();
    namespaces.insert(DEFAULT_EXEMPT_NAMESPACE.to_string());

    if let Some(ns) = own_namespace {
        if !ns.is_empty() {
            namespaces.insert(ns.to_string());
        }
    }

    for ns in configured
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|ns| !ns.is_empty())
    {
        namespaces.insert(ns.to_string());
    }

    namespaces
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|err| Error::Config(format!("invalid {name}: {err}"))),
        Err(_) => Ok(default),
    }
}
