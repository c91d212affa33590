//! Permissive decoding of admission objects into workload views.
//!
//! Decoding never fails the request: malformed bodies and unknown kinds
//! degrade to an empty [`WorkloadView`], which every rule treats as
//! vacuously compliant. The event is logged so operators can spot objects
//! that silently bypass evaluation.

use k8s_openapi::api::apps::v1::DeploymentSpec;
use k8s_openapi::api::core::v1::{Container, PodSpec};
use kube::core::DynamicObject;
use tracing::{debug, warn};

use super::workload::{ContainerView, DeploymentView, SecurityView, WorkloadView};

/// Build the view for the declared resource kind.
///
/// `Pod` and `Deployment` are extracted via their respective spec paths
/// (Deployment containers live under the embedded pod template); any other
/// kind yields an empty view.
pub fn decode(kind: &str, object: Option<&DynamicObject>) -> WorkloadView {
    match kind {
        "Pod" => pod_view(object),
        "Deployment" => deployment_view(object),
        other => {
            debug!(kind = %other, "unhandled resource kind, nothing to evaluate");
            WorkloadView::default()
        }
    }
}

fn pod_view(object: Option<&DynamicObject>) -> WorkloadView {
    let Some(spec) = pod_spec(object) else {
        return WorkloadView::default();
    };
    WorkloadView {
        containers: container_views(&spec, &["spec"]),
        deployment: None,
    }
}

fn deployment_view(object: Option<&DynamicObject>) -> WorkloadView {
    let Some(spec) = deployment_spec(object) else {
        return WorkloadView::default();
    };
    let pod_spec = spec.template.spec.as_ref();
    WorkloadView {
        containers: pod_spec
            .map(|pod| container_views(pod, &["spec", "template", "spec"]))
            .unwrap_or_default(),
        deployment: Some(DeploymentView {
            replicas: spec.replicas,
            enable_service_links: pod_spec.and_then(|pod| pod.enable_service_links),
        }),
    }
}

fn pod_spec(object: Option<&DynamicObject>) -> Option<PodSpec> {
    let raw = object?.data.get("spec")?;
    match serde_json::from_value(raw.clone()) {
        Ok(spec) => Some(spec),
        Err(err) => {
            warn!(error = %err, "failed to decode pod spec, treating object as empty");
            None
        }
    }
}

fn deployment_spec(object: Option<&DynamicObject>) -> Option<DeploymentSpec> {
    let raw = object?.data.get("spec")?;
    match serde_json::from_value(raw.clone()) {
        Ok(spec) => Some(spec),
        Err(err) => {
            warn!(error = %err, "failed to decode deployment spec, treating object as empty");
            None
        }
    }
}

/// Project both container slices in patchable order: regular containers
/// first, then init containers, preserving declaration order within each.
fn container_views(spec: &PodSpec, prefix: &[&str]) -> Vec<ContainerView> {
    let mut views = Vec::new();
    for (index, container) in spec.containers.iter().enumerate() {
        views.push(container_view(container, false, prefix, "containers", index));
    }
    for (index, container) in spec.init_containers.iter().flatten().enumerate() {
        views.push(container_view(
            container,
            true,
            prefix,
            "initContainers",
            index,
        ));
    }
    views
}

fn container_view(
    container: &Container,
    init: bool,
    prefix: &[&str],
    slice: &str,
    index: usize,
) -> ContainerView {
    let mut path: Vec<String> = prefix.iter().map(ToString::to_string).collect();
    path.push(slice.to_string());
    path.push(index.to_string());

    ContainerView {
        name: container.name.clone(),
        init,
        path,
        security_context: container.security_context.as_ref().map(|sc| SecurityView {
            allow_privilege_escalation: sc.allow_privilege_escalation,
            read_only_root_filesystem: sc.read_only_root_filesystem,
            run_as_user: sc.run_as_user,
        }),
        env_names: container
            .env
            .iter()
            .flatten()
            .map(|var| var.name.clone())
            .collect(),
        env_from_sources: container.env_from.as_ref().map_or(0, Vec::len),
        has_liveness_probe: container.liveness_probe.is_some(),
    }
}
