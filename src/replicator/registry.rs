//! # Replicator Registry
//!
//! Kind tag to replicator. Built once at startup and shared read-only.

use super::{ObjectReplicator, Replicator};
use crate::store::KubeObjectStore;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::Client;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no built-in replicator for kind {0}")]
    UnknownKind(String),
}

/// Kinds with a built-in replicator
pub const BUILTIN_KINDS: &[&str] = &["Secret", "ConfigMap"];

#[derive(Clone, Default)]
pub struct ReplicatorRegistry {
    replicators: BTreeMap<String, Arc<dyn Replicator>>,
}

impl std::fmt::Debug for ReplicatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicatorRegistry")
            .field("kinds", &self.replicators.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ReplicatorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a replicator under its own kind, returning any it replaced
    pub fn register(&mut self, replicator: Arc<dyn Replicator>) -> Option<Arc<dyn Replicator>> {
        self.replicators
            .insert(replicator.kind().to_string(), replicator)
    }

    #[must_use]
    pub fn with(mut self, replicator: Arc<dyn Replicator>) -> Self {
        self.register(replicator);
        self
    }

    /// Exact, case-sensitive lookup
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<&Arc<dyn Replicator>> {
        self.replicators.get(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.replicators.keys().map(String::as_str)
    }

    pub fn replicators(&self) -> impl Iterator<Item = &Arc<dyn Replicator>> {
        self.replicators.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.replicators.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.replicators.is_empty()
    }

    /// Registry of cluster-backed built-in replicators for `kinds`
    pub fn for_kinds<S: AsRef<str>>(client: &Client, kinds: &[S]) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for kind in kinds {
            registry.register(builtin(client, kind.as_ref())?);
        }
        Ok(registry)
    }
}

fn builtin(client: &Client, kind: &str) -> Result<Arc<dyn Replicator>, RegistryError> {
    match kind {
        "Secret" => Ok(Arc::new(ObjectReplicator::<Secret, _>::new(
            KubeObjectStore::<Secret>::new(client.clone()),
        ))),
        "ConfigMap" => Ok(Arc::new(ObjectReplicator::<ConfigMap, _>::new(
            KubeObjectStore::<ConfigMap>::new(client.clone()),
        ))),
        other => Err(RegistryError::UnknownKind(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryObjectStore;

    #[test]
    fn test_lookup_is_exact() {
        let registry = ReplicatorRegistry::new().with(Arc::new(ObjectReplicator::<Secret, _>::new(
            MemoryObjectStore::<Secret>::new(),
        )));

        assert!(registry.get("Secret").is_some());
        assert!(registry.get("secret").is_none());
        assert!(registry.get("ConfigMap").is_none());
        assert_eq!(registry.kinds().collect::<Vec<_>>(), vec!["Secret"]);
    }

    #[test]
    fn test_register_replaces_same_kind() {
        let mut registry = ReplicatorRegistry::new();
        assert!(registry
            .register(Arc::new(ObjectReplicator::<ConfigMap, _>::new(
                MemoryObjectStore::<ConfigMap>::new()
            )))
            .is_none());
        assert!(registry
            .register(Arc::new(ObjectReplicator::<ConfigMap, _>::new(
                MemoryObjectStore::<ConfigMap>::new()
            )))
            .is_some());
        assert_eq!(registry.len(), 1);
    }
}
