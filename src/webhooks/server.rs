//! Admission webhook server.
//!
//! Provides the HTTPS endpoint invoked synchronously by the API server
//! during object CREATE/UPDATE.
//!
//! To enable the webhook:
//! 1. Issue a serving certificate for the webhook Service
//! 2. Create the ValidatingWebhookConfiguration or MutatingWebhookConfiguration
//! 3. Mount the TLS certificate secret to the webhook pod at /etc/webhook/certs/
//!
//! Certificate issuance and webhook registration are operational concerns
//! owned outside this process; the server only reads the mounted PEM files.

use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use json_patch::Patch;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use tracing::{debug, error, info, warn};

use crate::engine::{Engine, Verdict};
use crate::error::Error;
use crate::health::HealthState;
use crate::policies::Mode;

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9443;

/// Shared state for the webhook handler
pub struct WebhookState {
    pub engine: Engine,
    pub health: Arc<HealthState>,
}

/// Route served by an instance, fixed by its policy mode.
pub fn webhook_path(mode: Mode) -> &'static str {
    match mode {
        Mode::Validate => "/validate",
        Mode::Mutate => "/mutate",
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    let path = webhook_path(state.engine.policy().mode);
    Router::new().route(path, post(review_handler)).with_state(state)
}

/// Admission webhook handler: decode the review envelope, run the engine,
/// encode the verdict back under the originating uid.
async fn review_handler(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> impl IntoResponse {
    let started = Instant::now();
    let policy = state.engine.policy().name;

    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(req) => req,
        Err(err) => {
            error!(error = %err, "Failed to extract admission request");
            state
                .health
                .metrics
                .record_decision(policy, "invalid", started.elapsed().as_secs_f64(), 0);
            return (
                StatusCode::BAD_REQUEST,
                Json(
                    AdmissionResponse::invalid(format!("Invalid AdmissionReview: {}", err))
                        .into_review(),
                ),
            );
        }
    };

    debug!(
        uid = %request.uid,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = ?request.name,
        policy,
        "Processing admission request"
    );

    let exempt = state.engine.is_exempt(request.namespace.as_deref());
    let verdict = state.engine.review(&request);
    let patch_ops = verdict.patch_ops();
    let (response, outcome) = encode_verdict(&request, verdict, exempt);

    state.health.metrics.record_decision(
        policy,
        outcome,
        started.elapsed().as_secs_f64(),
        if outcome == "patched" { patch_ops } else { 0 },
    );

    (StatusCode::OK, Json(response.into_review()))
}

/// Encode a verdict into the admission response, echoing the request uid.
///
/// Returns the response together with the outcome label recorded in
/// metrics. A patch that fails to serialize is fatal to this request only
/// and must not be reported as allowed.
fn encode_verdict(
    request: &AdmissionRequest<DynamicObject>,
    verdict: Verdict,
    exempt: bool,
) -> (AdmissionResponse, &'static str) {
    match verdict {
        Verdict::Deny { reasons } => {
            let message = reasons.join("; ");
            warn!(uid = %request.uid, message = %message, "Admission request denied");
            (AdmissionResponse::from(request).deny(message), "denied")
        }
        Verdict::Allow { patch } if patch.is_empty() => {
            info!(uid = %request.uid, exempt, "Admission request allowed");
            (
                AdmissionResponse::from(request),
                if exempt { "exempt" } else { "allowed" },
            )
        }
        Verdict::Allow { patch } => {
            info!(uid = %request.uid, ops = patch.len(), "Admission request patched");
            match AdmissionResponse::from(request).with_patch(Patch(patch)) {
                Ok(response) => (response, "patched"),
                Err(err) => {
                    error!(uid = %request.uid, error = %err, "Failed to serialize patch");
                    (
                        AdmissionResponse::invalid(format!("failed to serialize patch: {}", err)),
                        "invalid",
                    )
                }
            }
        }
    }
}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0:9443 and serves the policy's single route.
/// TLS certificates are loaded from the paths specified.
///
/// # Arguments
/// * `engine` - Configured decision engine
/// * `health` - Shared health/metrics state
/// * `cert_path` - Path to TLS certificate file (PEM format)
/// * `key_path` - Path to TLS private key file (PEM format)
pub async fn run_webhook_server(
    engine: Engine,
    health: Arc<HealthState>,
    cert_path: &str,
    key_path: &str,
) -> Result<(), Error> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let path = webhook_path(engine.policy().mode);
    let state = Arc::new(WebhookState { engine, health });
    let app = create_webhook_router(state);

    let config = RustlsConfig::from_pem_file(PathBuf::from(cert_path), PathBuf::from(key_path))
        .await
        .map_err(|e| Error::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], WEBHOOK_PORT));
    info!(port = WEBHOOK_PORT, path, "Webhook server listening with TLS");

    axum_server::bind_rustls(addr, config)
        .serve(app.into_make_service())
        .await
        .map_err(|e| Error::Server(e.to_string()))?;

    Ok(())
}
