//! The admission decision engine.
//!
//! One engine instance serves one policy. Per request the engine applies the
//! exemption filter, decodes the workload object into a [`WorkloadView`],
//! evaluates the policy rule, and produces a [`Verdict`]. Every decision is
//! a pure function of the request; nothing is retained across requests.

pub mod decode;
pub mod patch;
pub mod workload;

pub use workload::{ContainerView, DeploymentView, SecurityView, WorkloadView};

use std::collections::BTreeSet;

use json_patch::PatchOperation;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, Operation};
use tracing::debug;

use crate::policies::{ComplianceState, Mode, Policy, Rule};

/// Outcome of one admission decision.
///
/// Exactly one of the two shapes per request: an allow optionally carrying
/// patch operations, or a deny carrying at least one violation reason.
#[derive(Debug, Clone)]
pub enum Verdict {
    Allow { patch: Vec<PatchOperation> },
    Deny { reasons: Vec<String> },
}

impl Verdict {
    /// Unconditional allow with no patch.
    pub fn allow() -> Self {
        Verdict::Allow { patch: Vec::new() }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow { .. })
    }

    /// Number of patch operations carried by an allow verdict.
    pub fn patch_ops(&self) -> usize {
        match self {
            Verdict::Allow { patch } => patch.len(),
            Verdict::Deny { .. } => 0,
        }
    }
}

/// Decision engine for a single configured policy.
pub struct Engine {
    policy: Policy,
    exempt_namespaces: BTreeSet<String>,
}

impl Engine {
    pub fn new(policy: Policy, exempt_namespaces: impl IntoIterator<Item = String>) -> Self {
        Self {
            policy,
            exempt_namespaces: exempt_namespaces.into_iter().collect(),
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Whether requests from this namespace skip evaluation entirely.
    pub fn is_exempt(&self, namespace: Option<&str>) -> bool {
        namespace.is_some_and(|ns| self.exempt_namespaces.contains(ns))
    }

    /// Decide one admission request.
    ///
    /// The exemption filter runs before any decoding cost is paid, so exempt
    /// namespaces are allowed even for malformed objects. DELETE and CONNECT
    /// carry no object worth evaluating and are allowed outright.
    pub fn review(&self, request: &AdmissionRequest<DynamicObject>) -> Verdict {
        if self.is_exempt(request.namespace.as_deref()) {
            debug!(
                namespace = ?request.namespace,
                policy = self.policy.name,
                "namespace is exempt, skipping evaluation"
            );
            return Verdict::allow();
        }

        if matches!(request.operation, Operation::Delete | Operation::Connect) {
            return Verdict::allow();
        }

        let view = decode::decode(&request.kind.kind, request.object.as_ref());
        self.evaluate(&view)
    }

    /// Evaluate the policy rule against a decoded view.
    pub fn evaluate(&self, view: &WorkloadView) -> Verdict {
        match self.policy.mode {
            Mode::Validate => {
                let reasons = self.violations(view);
                if reasons.is_empty() {
                    Verdict::allow()
                } else {
                    Verdict::Deny { reasons }
                }
            }
            // Mutating policies never reject, they only rewrite.
            Mode::Mutate => Verdict::Allow {
                patch: self.corrections(view),
            },
        }
    }

    /// Collect every violation in declaration order; evaluation does not
    /// stop at the first non-compliant target.
    fn violations(&self, view: &WorkloadView) -> Vec<String> {
        match &self.policy.rule {
            Rule::Container(rule) => view
                .containers
                .iter()
                .filter(|container| rule.applies_to(container))
                .filter(|container| rule.evaluate(container) != ComplianceState::Compliant)
                .map(|container| rule.violation(container))
                .collect(),
            Rule::Workload(rule) => view
                .deployment
                .as_ref()
                .filter(|fields| rule.evaluate(fields) != ComplianceState::Compliant)
                .map(|fields| vec![rule.violation(fields)])
                .unwrap_or_default(),
        }
    }

    /// Collect one correction per non-compliant target, in declaration order.
    fn corrections(&self, view: &WorkloadView) -> Vec<PatchOperation> {
        match &self.policy.rule {
            Rule::Container(rule) => view
                .containers
                .iter()
                .filter(|container| rule.applies_to(container))
                .filter_map(|container| rule.correction(container, rule.evaluate(container)))
                .collect(),
            Rule::Workload(rule) => view
                .deployment
                .as_ref()
                .and_then(|fields| rule.correction(rule.evaluate(fields)))
                .into_iter()
                .collect(),
        }
    }
}
