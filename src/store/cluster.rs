//! # Kubernetes Stores
//!
//! `kube::Api` backed implementations of the store traits.

use super::{DeclarationStore, ObjectKey, ObjectStore, StoreError};
use crate::constants::FIELD_MANAGER;
use crate::crd::{ReplicatedResource, ReplicatedResourceStatus};
use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::core::NamespaceResourceScope;
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::marker::PhantomData;
use tracing::debug;

/// Namespaced objects of kind `K` in the cluster
pub struct KubeObjectStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeObjectStore<K> {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

impl<K> Clone for KubeObjectStore<K> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

impl<K> std::fmt::Debug for KubeObjectStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeObjectStore")
            .field("kind", &std::any::type_name::<K>())
            .finish_non_exhaustive()
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..PostParams::default()
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeObjectStore<K>
where
    K: Resource<Scope = NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug
        + Send
        + Sync
        + 'static,
    K::DynamicType: Default,
{
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), &key.namespace);
        api.get_opt(&key.name)
            .await
            .map_err(|e| StoreError::from_kube(key, e))
    }

    async fn create(&self, object: &K) -> Result<K, StoreError> {
        let key = ObjectKey::of(object);
        let api: Api<K> = Api::namespaced(self.client.clone(), &key.namespace);
        debug!(object = %key, "Creating object");
        api.create(&post_params(), object)
            .await
            .map_err(|e| StoreError::from_kube(&key, e))
    }

    async fn replace(&self, object: &K) -> Result<K, StoreError> {
        let key = ObjectKey::of(object);
        let api: Api<K> = Api::namespaced(self.client.clone(), &key.namespace);
        debug!(
            object = %key,
            resource_version = object.meta().resource_version.as_deref().unwrap_or("none"),
            "Replacing object"
        );
        api.replace(&key.name, &post_params(), object)
            .await
            .map_err(|e| StoreError::from_kube(&key, e))
    }
}

/// ReplicatedResource declarations in the cluster
#[derive(Clone)]
pub struct KubeDeclarationStore {
    client: Client,
}

impl KubeDeclarationStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl std::fmt::Debug for KubeDeclarationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeDeclarationStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl DeclarationStore for KubeDeclarationStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<ReplicatedResource>, StoreError> {
        let api: Api<ReplicatedResource> = Api::namespaced(self.client.clone(), &key.namespace);
        api.get_opt(&key.name)
            .await
            .map_err(|e| StoreError::from_kube(key, e))
    }

    async fn write_status(
        &self,
        declaration: &ReplicatedResource,
        status: &ReplicatedResourceStatus,
    ) -> Result<(), StoreError> {
        let key = declaration.key();
        let api: Api<ReplicatedResource> = Api::namespaced(self.client.clone(), &key.namespace);

        // A resourceVersion in a merge patch is enforced as a precondition by the API server
        let mut patch = serde_json::json!({ "status": status });
        if let Some(resource_version) = declaration.resource_version() {
            patch["metadata"] = serde_json::json!({ "resourceVersion": resource_version });
        }

        api.patch_status(
            &key.name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await
        .map_err(|e| StoreError::from_kube(&key, e))?;

        Ok(())
    }
}
