//! workload-webhook - Kubernetes admission webhooks for workload policies.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Resolves the configured policy from the environment
//! - Starts the health server and the TLS webhook server

use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};

use workload_webhook::health::{HealthState, run_health_server};
use workload_webhook::{Config, Engine, Policy, run_webhook_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("workload_webhook=info".parse()?),
        )
        .json()
        .init();

    info!("Starting workload-webhook");

    let config = Config::from_env()?;
    let policy = Policy::resolve(&config.policy, config.mode, config.targets)?;
    info!(
        policy = policy.name,
        mode = %policy.mode,
        exempt_namespaces = ?config.exempt_namespaces,
        "Resolved admission policy"
    );

    // Create shared health state
    let health_state = Arc::new(HealthState::new());

    // Start health server immediately (probes should work before TLS is up)
    let health_handle = {
        let health_state = health_state.clone();
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let engine = Engine::new(policy, config.exempt_namespaces.clone());

    // Decisions are synchronous and stateless; the instance is ready as soon
    // as the listener starts.
    health_state.set_ready(true).await;

    let webhook_handle = {
        let health_state = health_state.clone();
        let cert_path = config.cert_path.clone();
        let key_path = config.key_path.clone();
        tokio::spawn(async move {
            if let Err(e) = run_webhook_server(engine, health_state, &cert_path, &key_path).await {
                error!("Webhook server error: {}", e);
            }
        })
    };

    // Wait for any task to complete (or fail), or shutdown signal
    tokio::select! {
        result = webhook_handle => {
            if let Err(e) = result {
                error!("Webhook server task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        // Handle graceful shutdown on SIGTERM or SIGINT
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");
            health_state.set_ready(false).await;
        }
    }

    info!("Webhook stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the webhook cannot shut
/// down gracefully without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
