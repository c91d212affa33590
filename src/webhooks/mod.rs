//! Webhook module serving admission requests.
//!
//! One HTTPS route per instance: `/validate` for validating policies,
//! `/mutate` for mutating policies. The route invokes the decision engine
//! and encodes its verdict back into the admission review envelope.

mod server;

pub use server::{
    WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookState, create_webhook_router,
    run_webhook_server, webhook_path,
};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
