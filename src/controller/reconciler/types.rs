//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::replicator::{Operation, ReplicationError, ReplicatorRegistry};
use crate::store::{DeclarationStore, ObjectKey, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("failed to read declaration {key}: {source}")]
    DeclarationRead {
        key: ObjectKey,
        #[source]
        source: StoreError,
    },

    #[error("replication for {key} failed: {source}")]
    Replication {
        key: ObjectKey,
        #[source]
        source: ReplicationError,
    },

    #[error("failed to write status of {key}: {source}")]
    StatusWrite {
        key: ObjectKey,
        #[source]
        source: StoreError,
    },

    #[error("reconcile of {key} timed out after {timeout:?}")]
    Timeout { key: ObjectKey, timeout: Duration },
}

impl ReconcilerError {
    #[must_use]
    pub fn key(&self) -> &ObjectKey {
        match self {
            ReconcilerError::DeclarationRead { key, .. }
            | ReconcilerError::Replication { key, .. }
            | ReconcilerError::StatusWrite { key, .. }
            | ReconcilerError::Timeout { key, .. } => key,
        }
    }

    /// Short label for metrics
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            ReconcilerError::DeclarationRead { .. } => "declaration-read",
            ReconcilerError::Replication { source, .. } => source.as_label(),
            ReconcilerError::StatusWrite { .. } => "status-write",
            ReconcilerError::Timeout { .. } => "timeout",
        }
    }
}

/// How a reconcile that did not error ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The declaration no longer exists; its destination is garbage collected
    DeclarationMissing,
    /// Source and destination are the same object; nothing written
    SelfReferential,
    /// Destination created or updated, status Completed
    Replicated(Operation),
    /// Destination already carried the source fingerprint; status written only if not yet Completed
    Unchanged,
    /// Terminal failure recorded in status
    Failed { message: String },
}

impl ReconcileOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::DeclarationMissing => "declaration-missing",
            ReconcileOutcome::SelfReferential => "self-referential",
            ReconcileOutcome::Replicated(_) => "replicated",
            ReconcileOutcome::Unchanged => "unchanged",
            ReconcileOutcome::Failed { .. } => "failed",
        }
    }
}

/// Backoff state for a specific declaration
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Shared reconcile context
///
/// Cheap to clone; everything but the backoff map is immutable after startup.
#[derive(Clone)]
pub struct Reconciler {
    pub(crate) declarations: Arc<dyn DeclarationStore>,
    pub(crate) registry: Arc<ReplicatorRegistry>,
    pub(crate) config: Arc<ControllerConfig>,
    // Keyed by declaration; owned by the error policy, cleared on success
    pub(crate) backoff_states: Arc<Mutex<HashMap<ObjectKey, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(
        declarations: Arc<dyn DeclarationStore>,
        registry: ReplicatorRegistry,
        config: ControllerConfig,
    ) -> Self {
        Self {
            declarations,
            registry: Arc::new(registry),
            config: Arc::new(config),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ReplicatorRegistry {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Record a failure for `key` and return the delay before the next attempt
    /// together with the number of consecutive failures
    pub fn next_backoff(&self, key: &ObjectKey) -> (Duration, u32) {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let state = states.entry(key.clone()).or_insert_with(|| {
            BackoffState::new(self.config.backoff_min_secs, self.config.backoff_max_secs)
        });
        state.increment_error();
        (state.backoff.next_backoff(), state.error_count)
    }

    /// Forget the failure history of `key`
    pub fn reset_backoff(&self, key: &ObjectKey) {
        self.backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}
