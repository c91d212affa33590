//! Per-resource field checks.
//!
//! These rules inspect Deployment-level fields once per object rather than
//! walking containers. Resources without the relevant fields (Pods, unknown
//! kinds) are vacuously compliant.

use json_patch::PatchOperation;
use serde_json::json;

use super::ComplianceState;
use crate::engine::patch;
use crate::engine::workload::DeploymentView;

/// Declared replica count when `spec.replicas` is unset.
const DEFAULT_REPLICAS: i32 = 1;

const REPLICAS_PATH: [&str; 2] = ["spec", "replicas"];
const SERVICE_LINKS_PATH: [&str; 4] = ["spec", "template", "spec", "enableServiceLinks"];

/// A compliance rule evaluated once against the resource.
#[derive(Debug, Clone)]
pub enum WorkloadRule {
    /// `spec.replicas` must be at least `min`; an unset count is treated as
    /// the API server default of 1.
    MinReplicas { min: i32 },
    /// `spec.template.spec.enableServiceLinks` must be present and false.
    DisableServiceLinks,
}

impl WorkloadRule {
    /// Evaluate this rule against the Deployment-level fields.
    pub fn evaluate(&self, deployment: &DeploymentView) -> ComplianceState {
        match self {
            WorkloadRule::MinReplicas { min } => match deployment.replicas {
                Some(replicas) if replicas >= *min => ComplianceState::Compliant,
                Some(_) => ComplianceState::NonCompliantValue,
                None if DEFAULT_REPLICAS >= *min => ComplianceState::Compliant,
                None => ComplianceState::MissingContext,
            },
            WorkloadRule::DisableServiceLinks => match deployment.enable_service_links {
                Some(false) => ComplianceState::Compliant,
                Some(true) => ComplianceState::NonCompliantValue,
                None => ComplianceState::MissingContext,
            },
        }
    }

    /// Human-readable violation for a non-compliant resource.
    pub fn violation(&self, deployment: &DeploymentView) -> String {
        match self {
            WorkloadRule::MinReplicas { min } => format!(
                "spec.replicas must be at least {} (got {})",
                min,
                deployment.replicas.unwrap_or(DEFAULT_REPLICAS)
            ),
            WorkloadRule::DisableServiceLinks => {
                "spec.template.spec.enableServiceLinks must be set to false".to_string()
            }
        }
    }

    /// Correction patch for a non-compliant resource: exactly one operation
    /// for the single offending field.
    ///
    /// `spec.replicas` is always corrected with `replace` (the field's
    /// parent object always exists and the API server defaults the value);
    /// `enableServiceLinks` is added when absent and replaced when wrong.
    pub fn correction(&self, state: ComplianceState) -> Option<PatchOperation> {
        match (self, state) {
            (_, ComplianceState::Compliant) => None,
            (WorkloadRule::MinReplicas { min }, _) => {
                Some(patch::replace(REPLICAS_PATH, json!(min)))
            }
            (WorkloadRule::DisableServiceLinks, ComplianceState::MissingContext) => {
                Some(patch::add(SERVICE_LINKS_PATH, json!(false)))
            }
            (WorkloadRule::DisableServiceLinks, ComplianceState::NonCompliantValue) => {
                Some(patch::replace(SERVICE_LINKS_PATH, json!(false)))
            }
        }
    }
}
