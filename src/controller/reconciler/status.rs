//! # Status Writer
//!
//! Translates a replication result into the declaration's `status`. The
//! result fully determines the written status; only `lastTransitionTime` is
//! carried over from the previous condition when the condition status did not
//! change.
//!
//! An up-to-date destination still gets a `Completed` status when the
//! declaration does not already record one for its current generation, so a
//! retry after a rejected status write converges.

use crate::constants::{CONDITION_TYPE_COMPLETE, MESSAGE_REPLICATED, REASON_ERROR, REASON_REPLICATED};
use crate::crd::{
    Condition, ConditionStatus, ReplicatedResource, ReplicatedResourceStatus, ReplicationPhase,
};
use crate::replicator::{Replication, ReplicationError};
use crate::store::{DeclarationStore, StoreError};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

/// Whether `declaration` already records a successful replication of its current generation
#[must_use]
pub fn is_recorded_complete(declaration: &ReplicatedResource) -> bool {
    declaration.status.as_ref().is_some_and(|status| {
        status.phase == Some(ReplicationPhase::Completed)
            && status.observed_generation == declaration.metadata.generation
            && status
                .conditions
                .iter()
                .any(|c| c.r#type == CONDITION_TYPE_COMPLETE && c.status == ConditionStatus::True)
    })
}

/// Status to write for `result`, or `None` when the attempt changed nothing
/// and the declaration already says so
#[must_use]
pub fn status_for(
    declaration: &ReplicatedResource,
    result: &Result<Replication, ReplicationError>,
    now: DateTime<Utc>,
) -> Option<ReplicatedResourceStatus> {
    let (phase, status, reason, message) = match result {
        Ok(replication)
            if !replication.operation.is_mutating() && is_recorded_complete(declaration) =>
        {
            return None
        }
        Ok(_) => (
            ReplicationPhase::Completed,
            ConditionStatus::True,
            REASON_REPLICATED,
            MESSAGE_REPLICATED.to_string(),
        ),
        Err(e) => (
            ReplicationPhase::Failed,
            ConditionStatus::False,
            REASON_ERROR,
            e.to_string(),
        ),
    };

    let now = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    let last_transition_time = declaration
        .status
        .as_ref()
        .and_then(|s| s.conditions.iter().find(|c| c.r#type == CONDITION_TYPE_COMPLETE))
        .filter(|previous| previous.status == status)
        .and_then(|previous| previous.last_transition_time.clone())
        .unwrap_or_else(|| now.clone());

    Some(ReplicatedResourceStatus {
        phase: Some(phase),
        conditions: vec![Condition {
            r#type: CONDITION_TYPE_COMPLETE.to_string(),
            status,
            last_probe_time: Some(now),
            last_transition_time: Some(last_transition_time),
            reason: Some(reason.to_string()),
            message: Some(message),
        }],
        observed_generation: declaration.metadata.generation,
    })
}

/// Overwrite the status of `declaration` as a single write
///
/// # Errors
///
/// Returns the store error when the write is rejected.
pub async fn write_status(
    store: &dyn DeclarationStore,
    declaration: &ReplicatedResource,
    status: &ReplicatedResourceStatus,
) -> Result<(), StoreError> {
    debug!(
        declaration = %declaration.key(),
        phase = status.phase.map_or("none", |p| p.as_str()),
        "Writing status"
    );
    store.write_status(declaration, status).await
}
