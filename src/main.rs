//! Infrastructure Kubernetes Operator
//!
//! This operator manages the lifecycle of externally-provisioned
//! infrastructure declared through Infrastructure custom resources.
//!
//! ## Usage
//!
//! ```bash
//! # Run the operator (requires kubeconfig)
//! infra-operator
//!
//! # Run with custom log level
//! RUST_LOG=debug infra-operator
//! ```

use clap::Parser;
use infra_operator::{InfrastructureController, NoopActuator};
use kube::Client;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Infrastructure Kubernetes Operator
#[derive(Parser, Debug)]
#[command(name = "infra-operator")]
#[command(version, about = "Kubernetes Operator for provider infrastructure")]
struct Args {
    /// Namespace to watch (empty for all namespaces)
    #[arg(long, default_value = "")]
    namespace: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let args = Args::parse();

    info!("Starting Infrastructure Kubernetes Operator");
    info!(
        "Watching namespace: {}",
        if args.namespace.is_empty() {
            "all"
        } else {
            &args.namespace
        }
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    // The binary ships with the no-op actuator; provider builds supply their
    // own Actuator implementation and reuse the controller as a library
    let mut controller = InfrastructureController::new(client, Arc::new(NoopActuator));
    if !args.namespace.is_empty() {
        controller = controller.within_namespace(&args.namespace);
    }
    let controller = Arc::new(controller);

    let controller_handle = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            if let Err(e) = controller.run().await {
                error!("Infrastructure controller error: {}", e);
            }
        })
    };

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = controller_handle => {
            if let Err(e) = result {
                error!("Infrastructure controller task failed: {}", e);
            }
        }
    }

    info!("Infrastructure Operator shutting down");
    Ok(())
}
