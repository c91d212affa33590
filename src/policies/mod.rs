//! Admission policies for workload resources.
//!
//! Each deployed webhook instance enforces exactly one [`Policy`], selected
//! by name at startup. A policy pairs a rule with a mode:
//! - Validating: non-compliant objects are rejected with a message naming
//!   every offending container or field.
//! - Mutating: non-compliant objects are always admitted, rewritten by a
//!   minimal JSON-patch list.
//!
//! Rules come in two shapes: per-container field checks and per-resource
//! field checks (Deployment-level fields like the replica count).

pub mod container;
pub mod workload;

pub use container::ContainerRule;
pub use workload::WorkloadRule;

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Whether a policy rejects non-compliant objects or rewrites them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Validate,
    Mutate,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Validate => write!(f, "validate"),
            Mode::Mutate => write!(f, "mutate"),
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "validate" => Ok(Mode::Validate),
            "mutate" => Ok(Mode::Mutate),
            other => Err(Error::Config(format!(
                "unknown mode {:?}, expected \"validate\" or \"mutate\"",
                other
            ))),
        }
    }
}

/// Outcome of evaluating a rule against one target.
///
/// The three-way split matters for mutating policies: a container without
/// any `securityContext` needs the whole structure added (a field inside a
/// missing object is not addressable), while a present-but-wrong field needs
/// only that field corrected. Validating policies collapse the two
/// non-compliant states into a single violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplianceState {
    Compliant,
    MissingContext,
    NonCompliantValue,
}

/// A rule, tagged by the scope it inspects.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Field check applied to every container of the workload.
    Container(ContainerRule),
    /// Field check applied once to the resource itself.
    Workload(WorkloadRule),
}

/// One admission policy: a named rule plus its enforcement mode.
#[derive(Debug, Clone)]
pub struct Policy {
    pub name: &'static str,
    pub mode: Mode,
    pub rule: Rule,
}

/// Compliant target values that are deployment policy rather than code.
#[derive(Debug, Clone, Copy)]
pub struct Targets {
    /// Replica floor enforced by the min-replicas policy.
    pub min_replicas: i32,
    /// User id written by the mutating run-as-non-root policy.
    pub run_as_user: i64,
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            min_replicas: 3,
            run_as_user: 1000,
        }
    }
}

/// Names of all registered policies, in a stable order.
pub const POLICY_NAMES: &[&str] = &[
    "deny-privilege-escalation",
    "read-only-root-filesystem",
    "run-as-non-root",
    "forbid-environment-variables",
    "require-liveness-probe",
    "min-replicas",
    "disable-service-links",
];

impl Policy {
    /// Resolve a policy by name.
    ///
    /// `mode` overrides the rule's default mode; combinations the rule does
    /// not support (mutating a rule with no expressible correction) are
    /// configuration errors.
    pub fn resolve(name: &str, mode: Option<Mode>, targets: Targets) -> Result<Self, Error> {
        let (name, rule, default_mode) = match name {
            "deny-privilege-escalation" => (
                "deny-privilege-escalation",
                Rule::Container(ContainerRule::DenyPrivilegeEscalation),
                Mode::Mutate,
            ),
            "read-only-root-filesystem" => (
                "read-only-root-filesystem",
                Rule::Container(ContainerRule::ReadOnlyRootFilesystem),
                Mode::Mutate,
            ),
            "run-as-non-root" => (
                "run-as-non-root",
                Rule::Container(ContainerRule::RunAsNonRoot {
                    user: targets.run_as_user,
                }),
                Mode::Mutate,
            ),
            "forbid-environment-variables" => (
                "forbid-environment-variables",
                Rule::Container(ContainerRule::NoEnvironmentVariables),
                Mode::Validate,
            ),
            "require-liveness-probe" => (
                "require-liveness-probe",
                Rule::Container(ContainerRule::RequireLivenessProbe),
                Mode::Validate,
            ),
            "min-replicas" => (
                "min-replicas",
                Rule::Workload(WorkloadRule::MinReplicas {
                    min: targets.min_replicas,
                }),
                Mode::Mutate,
            ),
            "disable-service-links" => (
                "disable-service-links",
                Rule::Workload(WorkloadRule::DisableServiceLinks),
                Mode::Mutate,
            ),
            other => {
                return Err(Error::Config(format!(
                    "unknown policy {:?}, expected one of: {}",
                    other,
                    POLICY_NAMES.join(", ")
                )));
            }
        };

        let mode = mode.unwrap_or(default_mode);
        if mode == Mode::Mutate && !rule.supports_mutation() {
            return Err(Error::Config(format!(
                "policy {:?} has no correction and only supports validate mode",
                name
            )));
        }

        Ok(Policy { name, mode, rule })
    }
}

impl Rule {
    /// Whether a correction patch can be expressed for this rule.
    pub fn supports_mutation(&self) -> bool {
        match self {
            Rule::Container(rule) => rule.supports_mutation(),
            Rule::Workload(_) => true,
        }
    }
}
