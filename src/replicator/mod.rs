//! # Replicators
//!
//! A replicator is the capability to mirror one payload kind. The reconciler
//! only sees the [`Replicator`] trait and looks implementations up by kind in
//! the [`ReplicatorRegistry`], so adding a kind never touches the reconciler.
//!
//! Most kinds only differ in which fields make up their payload: implement
//! [`Mirror`] for the type and wrap a store in [`ObjectReplicator`].

mod config_map;
mod object;
mod registry;
mod secret;

pub use object::{replicated_fingerprint, Mirror, ObjectReplicator};
pub use registry::{RegistryError, ReplicatorRegistry};

use crate::crd::ReplicatedResource;
use crate::store::{ObjectKey, StoreError};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::discovery::ApiResource;
use thiserror::Error;

/// What a replication did to the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Created,
    Updated,
    /// Destination already carried the source fingerprint; nothing was written
    Unchanged,
}

impl Operation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Created => "created",
            Operation::Updated => "updated",
            Operation::Unchanged => "unchanged",
        }
    }

    #[must_use]
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Operation::Unchanged)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful replication
#[derive(Debug, Clone)]
pub struct Replication {
    pub operation: Operation,
    /// Destination metadata as stored after the attempt
    pub destination: ObjectMeta,
}

#[derive(Debug, Error)]
pub enum ReplicationError {
    #[error("Could not find source {kind} {key}")]
    SourceNotFound { kind: String, key: ObjectKey },

    #[error("Unsupported kind {0}")]
    UnsupportedKind(String),

    #[error("Invalid declaration {key}: {reason}")]
    InvalidDeclaration { key: ObjectKey, reason: String },

    #[error("{0}")]
    Store(#[from] StoreError),
}

impl ReplicationError {
    /// Store failures (conflicts, I/O) may succeed on a later attempt.
    /// Everything else needs the declaration or the source to change first.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReplicationError::Store(_))
    }

    /// Short label for metrics
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            ReplicationError::SourceNotFound { .. } => "source-not-found",
            ReplicationError::UnsupportedKind(_) => "unsupported-kind",
            ReplicationError::InvalidDeclaration { .. } => "invalid-declaration",
            ReplicationError::Store(e) if e.is_conflict() => "conflict",
            ReplicationError::Store(_) => "store",
        }
    }
}

/// Capability to mirror one kind of object
#[async_trait]
pub trait Replicator: Send + Sync {
    /// Kind tag matched against `spec.source.kind`
    fn kind(&self) -> &str;

    /// API resource of the kind, used to watch sources for changes
    fn api_resource(&self) -> ApiResource;

    /// Bring the destination of `declaration` in line with its source.
    ///
    /// Idempotent: returns [`Operation::Unchanged`] without writing when the
    /// destination already carries the source's fingerprint.
    async fn replicate(
        &self,
        declaration: &ReplicatedResource,
    ) -> Result<Replication, ReplicationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ReplicationError::UnsupportedKind("ConfigMap".to_string());
        assert_eq!(err.to_string(), "Unsupported kind ConfigMap");

        let err = ReplicationError::SourceNotFound {
            kind: "Secret".to_string(),
            key: ObjectKey::new("default", "missing"),
        };
        assert_eq!(err.to_string(), "Could not find source Secret default/missing");
    }

    #[test]
    fn test_only_store_errors_are_retryable() {
        assert!(!ReplicationError::UnsupportedKind("X".to_string()).is_retryable());
        assert!(ReplicationError::Store(StoreError::Unavailable("down".to_string())).is_retryable());
    }

    #[test]
    fn test_operation_mutating() {
        assert!(Operation::Created.is_mutating());
        assert!(Operation::Updated.is_mutating());
        assert!(!Operation::Unchanged.is_mutating());
    }
}
