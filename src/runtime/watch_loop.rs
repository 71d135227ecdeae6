//! # Watch Loop
//!
//! Runs `kube_runtime::Controller` over ReplicatedResource declarations.
//!
//! Reconciles are triggered by:
//! - declaration changes (create, update, delete)
//! - changes to destinations, through their controlling owner reference
//! - changes to sources of every registered kind, through the Trigger Index

use crate::config::ControllerConfig;
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::controller::trigger::TriggerIndex;
use crate::crd::ReplicatedResource;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::StreamExt;
use kube::api::{Api, DynamicObject};
use kube::Client;
use kube_runtime::{controller, watcher, Controller};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument};

/// Controller over all declarations, owning and watching every registered kind
fn build_controller(
    client: &Client,
    reconciler: &Reconciler,
    config: &ControllerConfig,
) -> Controller<ReplicatedResource> {
    let declarations: Api<ReplicatedResource> = Api::all(client.clone());
    let mut builder = Controller::new(declarations, watcher::Config::default().any_semantic())
        .with_config(
            controller::Config::default().concurrency(config.max_concurrent_reconciliations),
        );
    let index = TriggerIndex::new(builder.store());

    for replicator in reconciler.registry().replicators() {
        let resource = replicator.api_resource();
        let kind = replicator.kind().to_string();
        let objects: Api<DynamicObject> = Api::all_with(client.clone(), &resource);
        let index = index.clone();

        info!(kind = kind.as_str(), "Watching sources and destinations");
        builder = builder
            .owns_with(objects.clone(), resource.clone(), watcher::Config::default())
            .watches_with(
                objects,
                resource,
                watcher::Config::default(),
                move |source: DynamicObject| index.requests_for(&kind, &source),
            );
    }

    builder
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => {}
        () = terminate => {}
    }
}

/// Resolves once `shutdown` has been set
async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            // sender gone, nothing can request shutdown any more
            std::future::pending::<()>().await;
        }
    }
}

/// Run the controller watch loop
///
/// Restarts the controller stream when it ends or fails, until SIGINT or
/// SIGTERM requests shutdown. A signal marks the server not ready and lets
/// in-flight reconciles finish before the loop returns.
///
/// # Errors
///
/// Currently never fails; the signature leaves room for fatal startup errors.
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    config: ControllerConfig,
) -> Result<(), anyhow::Error> {
    let backoff_start_ms = config.backoff_min_secs.saturating_mul(1000);
    let max_backoff_ms = config.backoff_max_secs.saturating_mul(1000);
    let backoff_duration_ms = Arc::new(AtomicU64::new(backoff_start_ms));

    let (shutdown_tx, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        server_state.set_ready(false);
        let _ = shutdown_tx.send(true);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });

    loop {
        if *shutdown.borrow() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            operation = "watch_loop"
        );

        info!("Starting controller watch loop...");
        let backoff = Arc::clone(&backoff_duration_ms);
        let restart_delay = config.watch_restart_delay_duration();

        build_controller(&client, &reconciler, &config)
            .graceful_shutdown_on(shutdown_requested(shutdown.clone()))
            .run(
                reconcile,
                handle_reconciliation_error,
                Arc::clone(&reconciler),
            )
            .filter_map(move |event| {
                let backoff = Arc::clone(&backoff);
                async move {
                    match &event {
                        Ok((declaration, _action)) => {
                            backoff.store(backoff_start_ms, Ordering::Relaxed);
                            debug!(declaration = %declaration, "watch.event.success");
                            Some(event)
                        }
                        // already rescheduled by the error policy
                        Err(controller::Error::ReconcilerFailed(e, declaration)) => {
                            debug!(declaration = %declaration, error = %e, "watch.event.reconcile_failed");
                            Some(event)
                        }
                        Err(e) => {
                            let error_string = format!("{e:?}");
                            handle_watch_stream_error(
                                &error_string,
                                &backoff,
                                max_backoff_ms,
                                restart_delay,
                            )
                            .await
                            .map(|()| event)
                        }
                    }
                }
            })
            .for_each(|_| futures::future::ready(()))
            .instrument(watch_span)
            .await;

        if *shutdown.borrow() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let delay = config.watch_restart_delay_after_end_duration();
        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            delay.as_secs()
        );
        tokio::time::sleep(delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}
