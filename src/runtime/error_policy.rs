//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! This module handles reconciliation errors and watch stream errors.

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::ReplicatedResource;
use crate::observability::metrics;
use kube_runtime::controller::Action;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Instrument};

/// Reschedule a failed reconcile with per-declaration Fibonacci backoff
///
/// Backoff state is tracked per declaration so one failing declaration never
/// delays another. A later successful reconcile resets it.
pub fn handle_reconciliation_error(
    declaration: Arc<ReplicatedResource>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let key = declaration.key();
    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.namespace = %key.namespace,
        resource.name = %key.name,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}: {}", key, error);
    metrics::increment_reconciliation_errors(error.as_label());

    let (delay, error_count) = ctx.next_backoff(&key);
    let next_retry = chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| chrono::Utc::now().checked_add_signed(d))
        .map_or_else(|| "unknown".to_string(), |t| t.to_rfc3339());

    info!(
        error_count,
        retry_in_secs = delay.as_secs(),
        next_retry = next_retry.as_str(),
        "Retrying with Fibonacci backoff"
    );

    metrics::increment_requeues("error-backoff");
    Action::requeue(delay)
}

/// Watch stream failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    /// 401: credentials or RBAC revoked
    Unauthorized,
    /// 410: resource version too old, normal across restarts
    Expired,
    /// 429: API server storage (re)initializing
    Throttled,
    /// 404: watched resource or CRD missing
    NotFound,
    Other,
}

/// Classify a watch error from its debug rendering
#[must_use]
pub fn classify_watch_error(error: &str) -> WatchErrorKind {
    // 404 first: a plain-text 404 body surfaces wrapped in "WatchFailed"
    let is_not_found = error.contains("ObjectNotFound")
        || error.contains("404")
        || error.contains("not found");
    if (error.contains("401") || error.contains("Unauthorized")) && !is_not_found {
        WatchErrorKind::Unauthorized
    } else if error.contains("410")
        || error.contains("too old resource version")
        || error.contains("Expired")
        || error.contains("Gone")
    {
        WatchErrorKind::Expired
    } else if error.contains("429")
        || error.contains("storage is (re)initializing")
        || error.contains("TooManyRequests")
    {
        WatchErrorKind::Throttled
    } else if is_not_found {
        WatchErrorKind::NotFound
    } else {
        WatchErrorKind::Other
    }
}

/// Handle a watch stream error with classification and backoff
///
/// Returns `None` to filter the error out (the stream restarts) or `Some(())`
/// to keep consuming the stream.
pub async fn handle_watch_stream_error(
    error_string: &str,
    backoff_ms: &Arc<AtomicU64>,
    max_backoff_ms: u64,
    watch_restart_delay: Duration,
) -> Option<()> {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );
    async move {
        match classify_watch_error(error_string) {
            WatchErrorKind::Unauthorized => {
                error!("Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired");
                error!("   Verify the controller ServiceAccount can list and watch replicatedresources and the replicated kinds");
                warn!(
                    "Waiting {}s before retrying watch (RBAC may need time to propagate)...",
                    watch_restart_delay.as_secs()
                );
                tokio::time::sleep(watch_restart_delay).await;
                None
            }
            WatchErrorKind::Expired => {
                warn!(error_type = "410", "Watch resource version expired, watch will restart");
                None
            }
            WatchErrorKind::Throttled => {
                let current = backoff_ms.load(Ordering::Relaxed);
                warn!(
                    "API server storage reinitializing (429), backing off for {}ms before restart...",
                    current
                );
                tokio::time::sleep(Duration::from_millis(current)).await;
                backoff_ms.store(current.saturating_mul(2).min(max_backoff_ms), Ordering::Relaxed);
                None
            }
            WatchErrorKind::NotFound => {
                let resource_info = if error_string.contains("ReplicatedResource") {
                    "ReplicatedResource"
                } else {
                    "Resource"
                };
                warn!(
                    "{} not found (404) - this may be normal if it was deleted or the CRD is missing. Error: {}",
                    resource_info, error_string
                );
                Some(())
            }
            WatchErrorKind::Other => {
                error!("Controller stream error: {}", error_string);
                tokio::time::sleep(watch_restart_delay).await;
                None
            }
        }
    }
    .instrument(error_span)
    .await
}
