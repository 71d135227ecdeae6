//! # Object Stores
//!
//! The reconciler never talks to the Kubernetes API directly; it goes through
//! these traits so the same logic runs against the cluster or in memory.
//!
//! - `ObjectStore<K>` - read and conditionally write namespaced objects of one kind
//! - `DeclarationStore` - read declarations and write their status
//! - `DeclarationSnapshot` - point-in-time view of all declarations (Trigger Index input)

mod cluster;
mod memory;

pub use self::cluster::{KubeDeclarationStore, KubeObjectStore};
pub use self::memory::{MemoryDeclarationStore, MemoryObjectStore};

use crate::crd::{ReplicatedResource, ReplicatedResourceStatus};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Namespaced identity of an object
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of any object carrying Kubernetes metadata
    pub fn of<K: kube::Resource>(object: &K) -> Self {
        let meta = object.meta();
        Self::new(
            meta.namespace.clone().unwrap_or_default(),
            meta.name.clone().unwrap_or_default(),
        )
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// Optimistic concurrency violation: the object changed since it was read
    #[error("conflict writing {key}: {message}")]
    Conflict { key: ObjectKey, message: String },
    #[error("{key} not found")]
    NotFound { key: ObjectKey },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("Kubernetes API error: {0}")]
    Kube(#[source] kube::Error),
}

impl StoreError {
    /// Classify a kube client error for `key`
    #[must_use]
    pub fn from_kube(key: &ObjectKey, error: kube::Error) -> Self {
        match error {
            kube::Error::Api(ref api_err) if api_err.code == 409 => StoreError::Conflict {
                key: key.clone(),
                message: api_err.message.clone(),
            },
            kube::Error::Api(ref api_err) if api_err.code == 404 => {
                StoreError::NotFound { key: key.clone() }
            }
            other => StoreError::Kube(other),
        }
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Read and write access to namespaced objects of kind `K`
#[async_trait]
pub trait ObjectStore<K: Send + Sync + 'static>: Send + Sync {
    /// Fetch an object; absence is `Ok(None)`
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError>;

    /// Create an object at the namespace/name in its metadata
    async fn create(&self, object: &K) -> Result<K, StoreError>;

    /// Replace an existing object.
    ///
    /// The write is conditioned on `metadata.resourceVersion`: if the stored object
    /// has moved on, the call fails with [`StoreError::Conflict`].
    async fn replace(&self, object: &K) -> Result<K, StoreError>;
}

/// Access to declarations for the reconciler
#[async_trait]
pub trait DeclarationStore: Send + Sync {
    async fn get(&self, key: &ObjectKey) -> Result<Option<ReplicatedResource>, StoreError>;

    /// Overwrite the status of `declaration`, conditioned on its resourceVersion
    async fn write_status(
        &self,
        declaration: &ReplicatedResource,
        status: &ReplicatedResourceStatus,
    ) -> Result<(), StoreError>;
}

/// Consistent point-in-time list of declarations
///
/// Synchronous because it runs inside watch event mappers.
pub trait DeclarationSnapshot: Send + Sync {
    fn snapshot(&self) -> Result<Vec<Arc<ReplicatedResource>>, StoreError>;
}

impl DeclarationSnapshot for kube_runtime::reflector::Store<ReplicatedResource> {
    fn snapshot(&self) -> Result<Vec<Arc<ReplicatedResource>>, StoreError> {
        Ok(self.state())
    }
}
