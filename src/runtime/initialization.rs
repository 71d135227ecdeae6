//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, Kubernetes client and replicator registry setup.

use crate::config::{ControllerConfig, ServerConfig};
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::crd::ReplicatedResource;
use crate::observability;
use crate::replicator::ReplicatorRegistry;
use crate::store::KubeDeclarationStore;
use anyhow::{Context, Result};
use kube::api::{Api, ListParams};
use kube::{Client, ResourceExt};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    pub client: Client,
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    pub controller_config: ControllerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field(
                "server_ready",
                &self.server_state.is_ready.load(Ordering::Relaxed),
            )
            .field("controller_config", &self.controller_config)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - Tracing subscriber setup
/// - rustls crypto provider setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Replicator registry and reconciler setup
/// - Startup summary of existing declarations
///
/// # Errors
///
/// Fails when metrics cannot be registered, the HTTP server does not come up,
/// no Kubernetes client can be built, or `REPLICATED_KINDS` names a kind
/// without a built-in replicator.
pub async fn initialize() -> Result<InitializationResult> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resource_replication_controller=info".into()),
        )
        .init();

    // Must happen before the kube client opens any TLS connection
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A rustls crypto provider was already installed, keeping it");
    }

    info!("Starting Resource Replication Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let controller_config = ControllerConfig::from_env();
    let server_config = ServerConfig::from_env();
    info!(config = ?controller_config, "Loaded controller configuration");

    let server_state = Arc::new(ServerState::default());
    let server_state_clone = Arc::clone(&server_state);
    let server_port = server_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let registry = ReplicatorRegistry::for_kinds(&client, &controller_config.replicated_kinds)
        .context("Invalid REPLICATED_KINDS")?;
    info!(
        kinds = ?registry.kinds().collect::<Vec<_>>(),
        "Registered replicators"
    );

    let reconciler = Arc::new(Reconciler::new(
        Arc::new(KubeDeclarationStore::new(client.clone())),
        registry,
        controller_config.clone(),
    ));

    log_existing_declarations(&Api::all(client.clone())).await;

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        reconciler,
        server_state,
        controller_config,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &ServerState,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = server_config.startup_timeout();
    let poll_interval = server_config.poll_interval();
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// Log a per-namespace summary of the declarations present at startup
///
/// The controller's initial list reconciles all of them; this only confirms
/// the CRD is queryable and gives operators an inventory.
async fn log_existing_declarations(declarations: &Api<ReplicatedResource>) {
    let span = tracing::span!(
        tracing::Level::INFO,
        "controller.startup.existing_declarations"
    );
    let listed = declarations
        .list(&ListParams::default())
        .instrument(span.clone())
        .await;
    let _guard = span.enter();

    let list = match listed {
        Ok(list) => list,
        Err(e) => {
            warn!(
                "Could not list ReplicatedResource declarations (is the CRD installed?): {}",
                e
            );
            return;
        }
    };

    let mut by_namespace: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for item in &list.items {
        by_namespace
            .entry(item.namespace().unwrap_or_default())
            .or_default()
            .push(item.name_any());
    }

    info!("Resource Replication Controller - Startup Resource Summary");
    info!("Resource Kind: ReplicatedResource");
    info!("Total Resources: {}", list.items.len());
    info!("Namespaces: {}", by_namespace.len());
    for (namespace, mut names) in by_namespace {
        names.sort();
        info!("  {} ({}): {}", namespace, names.len(), names.join(", "));
    }
}
