//! workload-webhook library crate
//!
//! This module exports the admission decision engine, the policy family,
//! and the webhook/health servers.

pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod policies;
pub mod webhooks;

pub use config::Config;
pub use engine::{Engine, Verdict, WorkloadView};
pub use error::{Error, Result};
pub use health::HealthState;
pub use policies::{Mode, Policy, Targets};
pub use webhooks::{
    WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, create_webhook_router, run_webhook_server,
};
