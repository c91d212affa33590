//! Per-container field checks.
//!
//! Every rule is a total function over the decoded container view: absent
//! fields are non-compliant values, never errors.

use json_patch::PatchOperation;
use serde_json::{Map, Value, json};

use super::ComplianceState;
use crate::engine::patch;
use crate::engine::workload::ContainerView;

/// A compliance rule evaluated against each container of the workload.
#[derive(Debug, Clone)]
pub enum ContainerRule {
    /// `securityContext.allowPrivilegeEscalation` must be present and false.
    DenyPrivilegeEscalation,
    /// `securityContext.readOnlyRootFilesystem` must be present and true.
    ReadOnlyRootFilesystem,
    /// `securityContext.runAsUser` must be present and non-zero; mutating
    /// corrections write the configured user id.
    RunAsNonRoot { user: i64 },
    /// The container must declare no `env` entries and no `envFrom` imports.
    NoEnvironmentVariables,
    /// A `livenessProbe` must be declared. Presence only; fields within the
    /// probe are not inspected.
    RequireLivenessProbe,
}

impl ContainerRule {
    /// Evaluate this rule against one container.
    pub fn evaluate(&self, container: &ContainerView) -> ComplianceState {
        match self {
            ContainerRule::DenyPrivilegeEscalation => {
                match container.security_context {
                    None => ComplianceState::MissingContext,
                    Some(sc) if sc.allow_privilege_escalation == Some(false) => {
                        ComplianceState::Compliant
                    }
                    Some(_) => ComplianceState::NonCompliantValue,
                }
            }
            ContainerRule::ReadOnlyRootFilesystem => match container.security_context {
                None => ComplianceState::MissingContext,
                Some(sc) if sc.read_only_root_filesystem == Some(true) => {
                    ComplianceState::Compliant
                }
                Some(_) => ComplianceState::NonCompliantValue,
            },
            ContainerRule::RunAsNonRoot { .. } => match container.security_context {
                None => ComplianceState::MissingContext,
                Some(sc) if matches!(sc.run_as_user, Some(uid) if uid != 0) => {
                    ComplianceState::Compliant
                }
                Some(_) => ComplianceState::NonCompliantValue,
            },
            ContainerRule::NoEnvironmentVariables => {
                if container.env_names.is_empty() && container.env_from_sources == 0 {
                    ComplianceState::Compliant
                } else {
                    ComplianceState::NonCompliantValue
                }
            }
            ContainerRule::RequireLivenessProbe => {
                if container.has_liveness_probe {
                    ComplianceState::Compliant
                } else {
                    ComplianceState::NonCompliantValue
                }
            }
        }
    }

    /// Whether this rule evaluates the given container at all.
    ///
    /// Init containers cannot declare liveness probes, so the probe rule
    /// skips them; every other rule covers both slices.
    pub fn applies_to(&self, container: &ContainerView) -> bool {
        match self {
            ContainerRule::RequireLivenessProbe => !container.init,
            _ => true,
        }
    }

    /// Whether a correction patch can be expressed for this rule.
    pub fn supports_mutation(&self) -> bool {
        self.field().is_some()
    }

    /// Human-readable violation for a non-compliant container.
    pub fn violation(&self, container: &ContainerView) -> String {
        match self {
            ContainerRule::DenyPrivilegeEscalation => format!(
                "container {:?} must set securityContext.allowPrivilegeEscalation to false",
                container.name
            ),
            ContainerRule::ReadOnlyRootFilesystem => format!(
                "container {:?} must set securityContext.readOnlyRootFilesystem to true",
                container.name
            ),
            ContainerRule::RunAsNonRoot { .. } => format!(
                "container {:?} must set securityContext.runAsUser to a non-zero user id",
                container.name
            ),
            ContainerRule::NoEnvironmentVariables => {
                let mut found = Vec::new();
                if !container.env_names.is_empty() {
                    found.push(format!("env: {}", container.env_names.join(", ")));
                }
                if container.env_from_sources > 0 {
                    found.push(format!("envFrom sources: {}", container.env_from_sources));
                }
                format!(
                    "container {:?} must not declare environment variables ({})",
                    container.name,
                    found.join("; ")
                )
            }
            ContainerRule::RequireLivenessProbe => {
                format!("container {:?} must define a livenessProbe", container.name)
            }
        }
    }

    /// Correction patch for a non-compliant container.
    ///
    /// When the container has no `securityContext` at all the whole structure
    /// is added, pre-populated with the compliant value; when the structure
    /// exists, only the offending field is added. Exactly one operation per
    /// container, never both.
    pub fn correction(
        &self,
        container: &ContainerView,
        state: ComplianceState,
    ) -> Option<PatchOperation> {
        let (field, value) = self.field()?;
        match state {
            ComplianceState::Compliant => None,
            ComplianceState::MissingContext => {
                let mut context = Map::new();
                context.insert(field.to_string(), value);
                Some(patch::add(
                    container
                        .path
                        .iter()
                        .map(String::as_str)
                        .chain(["securityContext"]),
                    Value::Object(context),
                ))
            }
            ComplianceState::NonCompliantValue => Some(patch::add(
                container
                    .path
                    .iter()
                    .map(String::as_str)
                    .chain(["securityContext", field]),
                value,
            )),
        }
    }

    /// The security-context field this rule corrects, with its compliant
    /// value. Rules without an expressible correction return `None`.
    fn field(&self) -> Option<(&'static str, Value)> {
        match self {
            ContainerRule::DenyPrivilegeEscalation => {
                Some(("allowPrivilegeEscalation", json!(false)))
            }
            ContainerRule::ReadOnlyRootFilesystem => Some(("readOnlyRootFilesystem", json!(true))),
            ContainerRule::RunAsNonRoot { user } => Some(("runAsUser", json!(user))),
            ContainerRule::NoEnvironmentVariables | ContainerRule::RequireLivenessProbe => None,
        }
    }
}
