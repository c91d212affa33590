//! Engine-level decision tests: verdict shapes, ordering, patch granularity,
//! and idempotence, driven through typed admission requests.

use json_patch::{Patch, PatchOperation};
use serde_json::{Value, json};

use workload_webhook::engine::{Engine, Verdict};
use workload_webhook::policies::{Mode, POLICY_NAMES, Policy, Targets};

use crate::fixtures::{AdmissionReviewBuilder, ContainerFixture};

fn engine(name: &str, mode: Option<Mode>) -> Engine {
    let policy = Policy::resolve(name, mode, Targets::default()).expect("known policy");
    Engine::new(policy, ["webhook-system".to_string()])
}

fn patch_ops(verdict: Verdict) -> Vec<PatchOperation> {
    match verdict {
        Verdict::Allow { patch } => patch,
        Verdict::Deny { reasons } => panic!("expected allow, got deny: {reasons:?}"),
    }
}

fn deny_reasons(verdict: Verdict) -> Vec<String> {
    match verdict {
        Verdict::Deny { reasons } => reasons,
        Verdict::Allow { .. } => panic!("expected deny"),
    }
}

fn rendered(ops: &[PatchOperation]) -> Vec<Value> {
    ops.iter()
        .map(|op| serde_json::to_value(op).unwrap())
        .collect()
}

#[test]
fn test_empty_workload_is_vacuously_compliant() {
    let empty_pod = AdmissionReviewBuilder::pod();

    for name in POLICY_NAMES {
        let validating = engine(name, Some(Mode::Validate));
        assert!(
            validating.review(&empty_pod.request()).is_allowed(),
            "validating {name} flagged a containerless pod"
        );

        let policy = Policy::resolve(name, None, Targets::default()).unwrap();
        if policy.mode == Mode::Mutate {
            let mutating = engine(name, None);
            let ops = patch_ops(mutating.review(&empty_pod.request()));
            assert!(ops.is_empty(), "mutating {name} patched a containerless pod");
        }
    }
}

#[test]
fn test_exempt_namespace_allows_malformed_objects() {
    let review = AdmissionReviewBuilder::pod()
        .namespace("webhook-system")
        .object(json!({"apiVersion": "v1", "kind": "Pod", "spec": 17}));

    for mode in [Mode::Validate, Mode::Mutate] {
        let engine = engine("deny-privilege-escalation", Some(mode));
        let verdict = engine.review(&review.request());
        assert!(verdict.is_allowed());
        assert_eq!(verdict.patch_ops(), 0);
    }
}

#[test]
fn test_deny_lists_every_container_in_declaration_order() {
    let engine = engine("deny-privilege-escalation", Some(Mode::Validate));
    let review = AdmissionReviewBuilder::pod()
        .container(ContainerFixture::new("alpha"))
        .container(ContainerFixture::new("beta"))
        .container(ContainerFixture::new("gamma"));

    let reasons = deny_reasons(engine.review(&review.request()));
    assert_eq!(reasons.len(), 3);
    assert!(reasons[0].contains("\"alpha\""));
    assert!(reasons[1].contains("\"beta\""));
    assert!(reasons[2].contains("\"gamma\""));
}

#[test]
fn test_patch_granularity() {
    // First container has no security context at all: the whole structure is
    // added. Second container has the structure with a wrong value: only the
    // field is added. Never both for the same container.
    let engine = engine("deny-privilege-escalation", None);
    let review = AdmissionReviewBuilder::pod()
        .container(ContainerFixture::new("bare"))
        .container(
            ContainerFixture::new("escalating")
                .security_context(json!({"allowPrivilegeEscalation": true})),
        );

    let ops = rendered(&patch_ops(engine.review(&review.request())));
    assert_eq!(ops.len(), 2);

    assert_eq!(ops[0]["op"], "add");
    assert_eq!(ops[0]["path"], "/spec/containers/0/securityContext");
    assert_eq!(ops[0]["value"], json!({"allowPrivilegeEscalation": false}));

    assert_eq!(ops[1]["op"], "add");
    assert_eq!(
        ops[1]["path"],
        "/spec/containers/1/securityContext/allowPrivilegeEscalation"
    );
    assert_eq!(ops[1]["value"], json!(false));
}

#[test]
fn test_compliant_pod_yields_no_patch() {
    let engine = engine("deny-privilege-escalation", None);
    let review = AdmissionReviewBuilder::pod().container(
        ContainerFixture::new("app").security_context(json!({"allowPrivilegeEscalation": false})),
    );

    assert!(patch_ops(engine.review(&review.request())).is_empty());
}

#[test]
fn test_unset_replicas_gets_single_replace_patch() {
    let engine = engine("min-replicas", None);
    let review = AdmissionReviewBuilder::deployment().container(ContainerFixture::new("app"));

    let ops = rendered(&patch_ops(engine.review(&review.request())));
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0]["op"], "replace");
    assert_eq!(ops[0]["path"], "/spec/replicas");
    assert_eq!(ops[0]["value"], json!(3));
}

#[test]
fn test_sufficient_replicas_yield_empty_patch() {
    let engine = engine("min-replicas", None);
    let review = AdmissionReviewBuilder::deployment()
        .replicas(5)
        .container(ContainerFixture::new("app"));

    assert!(patch_ops(engine.review(&review.request())).is_empty());
}

#[test]
fn test_replica_floor_validate_denies() {
    let engine = engine("min-replicas", Some(Mode::Validate));
    let review = AdmissionReviewBuilder::deployment()
        .replicas(2)
        .container(ContainerFixture::new("app"));

    let reasons = deny_reasons(engine.review(&review.request()));
    assert_eq!(reasons.len(), 1);
    assert!(reasons[0].contains("at least 3"));
    assert!(reasons[0].contains("got 2"));
}

#[test]
fn test_env_deny_lists_variable_names() {
    let engine = engine("forbid-environment-variables", None);
    let review = AdmissionReviewBuilder::deployment()
        .replicas(3)
        .container(
            ContainerFixture::new("app")
                .env("DATABASE_URL", "postgres://db")
                .env("LOG_LEVEL", "debug"),
        )
        .container(ContainerFixture::new("clean"));

    let reasons = deny_reasons(engine.review(&review.request()));
    assert_eq!(reasons.len(), 1);
    assert!(reasons[0].contains("\"app\""));
    assert!(reasons[0].contains("DATABASE_URL"));
    assert!(reasons[0].contains("LOG_LEVEL"));
}

#[test]
fn test_env_from_import_is_also_denied() {
    let engine = engine("forbid-environment-variables", None);
    let review = AdmissionReviewBuilder::pod()
        .container(ContainerFixture::new("app").env_from_config_map());

    let reasons = deny_reasons(engine.review(&review.request()));
    assert!(reasons[0].contains("envFrom"));
}

#[test]
fn test_liveness_probe_policy_skips_init_containers() {
    let engine = engine("require-liveness-probe", None);
    let review = AdmissionReviewBuilder::pod()
        .container(ContainerFixture::new("probed").liveness_probe())
        .container(ContainerFixture::new("unprobed"))
        .init_container(ContainerFixture::new("setup"));

    let reasons = deny_reasons(engine.review(&review.request()));
    assert_eq!(reasons.len(), 1);
    assert!(reasons[0].contains("\"unprobed\""));
}

#[test]
fn test_regular_containers_are_patched_before_init_containers() {
    let engine = engine("read-only-root-filesystem", None);
    let review = AdmissionReviewBuilder::pod()
        .container(ContainerFixture::new("app"))
        .init_container(ContainerFixture::new("setup"));

    let ops = rendered(&patch_ops(engine.review(&review.request())));
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0]["path"], "/spec/containers/0/securityContext");
    assert_eq!(ops[1]["path"], "/spec/initContainers/0/securityContext");
    assert_eq!(ops[1]["value"], json!({"readOnlyRootFilesystem": true}));
}

#[test]
fn test_deployment_containers_are_patched_under_the_template() {
    let engine = engine("deny-privilege-escalation", None);
    let review = AdmissionReviewBuilder::deployment()
        .replicas(3)
        .container(ContainerFixture::new("app"));

    let ops = rendered(&patch_ops(engine.review(&review.request())));
    assert_eq!(ops.len(), 1);
    assert_eq!(
        ops[0]["path"],
        "/spec/template/spec/containers/0/securityContext"
    );
}

#[test]
fn test_service_links_patch_ops() {
    let engine = engine("disable-service-links", None);

    let absent = AdmissionReviewBuilder::deployment()
        .replicas(3)
        .container(ContainerFixture::new("app"));
    let ops = rendered(&patch_ops(engine.review(&absent.request())));
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0]["op"], "add");
    assert_eq!(ops[0]["path"], "/spec/template/spec/enableServiceLinks");
    assert_eq!(ops[0]["value"], json!(false));

    let enabled = absent.clone().enable_service_links(true);
    let ops = rendered(&patch_ops(engine.review(&enabled.request())));
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0]["op"], "replace");

    let disabled = absent.enable_service_links(false);
    assert!(patch_ops(engine.review(&disabled.request())).is_empty());
}

/// Apply a mutating verdict to the object and resubmit it: the second pass
/// must find nothing left to correct.
fn assert_idempotent(engine: &Engine, review: AdmissionReviewBuilder) {
    let ops = patch_ops(engine.review(&review.request()));
    assert!(!ops.is_empty(), "scenario must start non-compliant");

    let mut object = review.object_value();
    json_patch::patch(&mut object, &Patch(ops)).expect("patch must apply to its own object");

    let resubmitted = review.object(object);
    let second_pass = patch_ops(engine.review(&resubmitted.request()));
    assert!(second_pass.is_empty(), "patched object was corrected again");
}

#[test]
fn test_mutating_policies_are_idempotent() {
    let bare_pod = || AdmissionReviewBuilder::pod().container(ContainerFixture::new("app"));

    assert_idempotent(&engine("deny-privilege-escalation", None), bare_pod());
    assert_idempotent(&engine("read-only-root-filesystem", None), bare_pod());
    assert_idempotent(&engine("run-as-non-root", None), bare_pod());

    // run-as-non-root with the structure present but running as root
    assert_idempotent(
        &engine("run-as-non-root", None),
        AdmissionReviewBuilder::pod()
            .container(ContainerFixture::new("app").security_context(json!({"runAsUser": 0}))),
    );

    // replace keeps its target addressable, so start from an existing count
    assert_idempotent(
        &engine("min-replicas", None),
        AdmissionReviewBuilder::deployment()
            .replicas(1)
            .container(ContainerFixture::new("app")),
    );

    assert_idempotent(
        &engine("disable-service-links", None),
        AdmissionReviewBuilder::deployment()
            .replicas(3)
            .enable_service_links(true)
            .container(ContainerFixture::new("app")),
    );
}
