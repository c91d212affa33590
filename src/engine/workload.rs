//! Policy-relevant projections of workload objects.
//!
//! A [`WorkloadView`] is built fresh per request and never mutated in place;
//! corrections are expressed as patch deltas against the original object,
//! which remains the API server's source of truth.

/// Decoded projection of the workload object under review.
///
/// Containers are listed in patchable order: regular containers first, then
/// init containers, each in declaration order. An empty view (no containers,
/// no Deployment fields) is vacuously compliant for every rule.
#[derive(Debug, Clone, Default)]
pub struct WorkloadView {
    pub containers: Vec<ContainerView>,
    /// Resource-level fields, present only when the object is a Deployment.
    pub deployment: Option<DeploymentView>,
}

/// One container, with the JSON-pointer tokens addressing it in the
/// original object (e.g. `["spec", "containers", "0"]`).
#[derive(Debug, Clone)]
pub struct ContainerView {
    pub name: String,
    pub init: bool,
    pub path: Vec<String>,
    pub security_context: Option<SecurityView>,
    /// Names of directly declared environment variables, in order.
    pub env_names: Vec<String>,
    /// Number of `envFrom` source imports.
    pub env_from_sources: usize,
    pub has_liveness_probe: bool,
}

/// The security-context fields the rule family inspects.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityView {
    pub allow_privilege_escalation: Option<bool>,
    pub read_only_root_filesystem: Option<bool>,
    pub run_as_user: Option<i64>,
}

/// Deployment-level fields inspected by per-resource rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeploymentView {
    pub replicas: Option<i32>,
    pub enable_service_links: Option<bool>,
}

impl ContainerView {
    /// Minimal container for tests and fixtures.
    pub fn named(name: impl Into<String>, path: Vec<String>) -> Self {
        Self {
            name: name.into(),
            init: false,
            path,
            security_context: None,
            env_names: Vec::new(),
            env_from_sources: 0,
            has_liveness_probe: false,
        }
    }
}
