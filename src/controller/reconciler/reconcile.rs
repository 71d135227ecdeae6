//! # Reconcile
//!
//! The per-declaration state machine and its adapter to `kube_runtime`.

use super::status::{status_for, write_status};
use super::types::{ReconcileOutcome, Reconciler, ReconcilerError};
use crate::config::ControllerConfig;
use crate::crd::ReplicatedResource;
use crate::observability::metrics;
use crate::replicator::ReplicationError;
use crate::store::ObjectKey;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

impl Reconciler {
    /// Reconcile the declaration at `key` once.
    ///
    /// Terminal failures (missing source, unsupported kind, invalid
    /// declaration) are recorded in status and returned as
    /// [`ReconcileOutcome::Failed`]. Store failures are recorded on a best
    /// effort basis and returned as errors so the attempt is retried.
    ///
    /// # Errors
    ///
    /// Fails when the declaration cannot be read, on a retryable replication
    /// failure, or when the status write is rejected.
    pub async fn reconcile_declaration(
        &self,
        key: &ObjectKey,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        let declaration = match self.declarations.get(key).await {
            Ok(Some(declaration)) => declaration,
            Ok(None) => {
                debug!(declaration = %key, "Declaration not found, nothing to do");
                return Ok(ReconcileOutcome::DeclarationMissing);
            }
            Err(source) => {
                return Err(ReconcilerError::DeclarationRead {
                    key: key.clone(),
                    source,
                })
            }
        };

        if declaration.is_self_referential() {
            warn!(
                declaration = %key,
                source = %declaration.spec.source,
                "Declaration uses itself as source, skipping"
            );
            return Ok(ReconcileOutcome::SelfReferential);
        }

        let kind = declaration.spec.source.kind.as_str();
        let result = match self.registry.get(kind) {
            Some(replicator) => replicator.replicate(&declaration).await,
            None => Err(ReplicationError::UnsupportedKind(kind.to_string())),
        };
        if let Ok(replication) = &result {
            metrics::increment_replications(kind, replication.operation.as_str());
        }

        let Some(status) = status_for(&declaration, &result, chrono::Utc::now()) else {
            debug!(declaration = %key, "Destination already up to date");
            return Ok(ReconcileOutcome::Unchanged);
        };
        let written = write_status(self.declarations.as_ref(), &declaration, &status).await;

        match (result, written) {
            (Err(source), written) if source.is_retryable() => {
                if let Err(e) = written {
                    warn!(declaration = %key, error = %e, "Failed to record failure in status");
                }
                Err(ReconcilerError::Replication {
                    key: key.clone(),
                    source,
                })
            }
            (_, Err(source)) => Err(ReconcilerError::StatusWrite {
                key: key.clone(),
                source,
            }),
            (Ok(replication), Ok(())) if replication.operation.is_mutating() => {
                Ok(ReconcileOutcome::Replicated(replication.operation))
            }
            (Ok(_), Ok(())) => {
                info!(declaration = %key, "Destination up to date, recorded Completed status");
                Ok(ReconcileOutcome::Unchanged)
            }
            (Err(e), Ok(())) => {
                warn!(declaration = %key, error = %e, "Replication failed");
                Ok(ReconcileOutcome::Failed {
                    message: e.to_string(),
                })
            }
        }
    }
}

/// Scheduler action for a successful reconcile
#[must_use]
pub fn action_for(outcome: &ReconcileOutcome, config: &ControllerConfig) -> Action {
    match (outcome, config.verify_requeue()) {
        // one re-check after our own write; an up-to-date destination ends the cycle
        (ReconcileOutcome::Replicated(operation), Some(delay)) if operation.is_mutating() => {
            metrics::increment_requeues("verify");
            Action::requeue(delay)
        }
        _ => Action::await_change(),
    }
}

/// Reconcile entry point for `kube_runtime::Controller`
///
/// # Errors
///
/// Propagates [`ReconcilerError`] from the attempt, or a timeout when the
/// attempt exceeds the configured bound. The in-flight attempt is dropped on
/// timeout.
pub async fn reconcile(
    declaration: Arc<ReplicatedResource>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let key = declaration.key();
    let span = tracing::info_span!(
        "controller.reconcile",
        resource.namespace = %key.namespace,
        resource.name = %key.name,
    );

    async move {
        let start = Instant::now();
        metrics::increment_reconciliations();

        let timeout = ctx.config.reconcile_timeout();
        let result = match tokio::time::timeout(timeout, ctx.reconcile_declaration(&key)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(ReconcilerError::Timeout {
                key: key.clone(),
                timeout,
            }),
        };
        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

        let outcome = result?;
        ctx.reset_backoff(&key);
        match &outcome {
            ReconcileOutcome::Replicated(operation) => {
                info!(operation = %operation, "Reconciled");
            }
            other => debug!(outcome = other.as_str(), "Reconciled"),
        }
        Ok(action_for(&outcome, &ctx.config))
    }
    .instrument(span)
    .await
}
