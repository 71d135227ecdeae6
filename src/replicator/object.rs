//! # Object Replicator
//!
//! Create-or-update of a destination object from a source object of the same
//! kind, keyed on the source fingerprint (its resourceVersion).

use super::{Operation, Replication, ReplicationError, Replicator};
use crate::constants::{REPLICATED_AT_ANNOTATION, REPLICATED_FROM_VERSION_ANNOTATION};
use crate::crd::ReplicatedResource;
use crate::store::{ObjectKey, ObjectStore};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::discovery::ApiResource;
use kube::Resource;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use tracing::{debug, info};

/// Kind-specific payload copy
pub trait Mirror: Resource<DynamicType = ()> + Clone + Default + Send + Sync + 'static {
    /// Copy the payload of `source` onto `destination`, leaving metadata alone
    fn mirror_payload(source: &Self, destination: &mut Self);
}

/// Fingerprint of the source as of the last write to `destination`
pub fn replicated_fingerprint<K: Resource>(destination: &K) -> Option<&str> {
    destination
        .meta()
        .annotations
        .as_ref()?
        .get(REPLICATED_FROM_VERSION_ANNOTATION)
        .map(String::as_str)
}

/// Replicator for any [`Mirror`] kind over an [`ObjectStore`]
pub struct ObjectReplicator<K, S> {
    store: S,
    kind: String,
    _payload: PhantomData<fn() -> K>,
}

impl<K, S> std::fmt::Debug for ObjectReplicator<K, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectReplicator")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl<K, S> ObjectReplicator<K, S>
where
    K: Mirror,
    S: ObjectStore<K>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            kind: K::kind(&()).into_owned(),
            _payload: PhantomData,
        }
    }

    fn stamp(
        destination: &mut K,
        owner: OwnerReference,
        fingerprint: &str,
        replicated_at: &str,
    ) {
        let meta = destination.meta_mut();
        let annotations = meta.annotations.get_or_insert_with(BTreeMap::new);
        annotations.insert(
            REPLICATED_AT_ANNOTATION.to_string(),
            replicated_at.to_string(),
        );
        annotations.insert(
            REPLICATED_FROM_VERSION_ANNOTATION.to_string(),
            fingerprint.to_string(),
        );
        meta.owner_references = Some(vec![owner]);
    }
}

#[async_trait]
impl<K, S> Replicator for ObjectReplicator<K, S>
where
    K: Mirror,
    S: ObjectStore<K>,
{
    fn kind(&self) -> &str {
        &self.kind
    }

    fn api_resource(&self) -> ApiResource {
        ApiResource::erase::<K>(&())
    }

    async fn replicate(
        &self,
        declaration: &ReplicatedResource,
    ) -> Result<Replication, ReplicationError> {
        let source_key = declaration.source_key();
        let destination_key = declaration.key();

        let source = self.store.get(&source_key).await?.ok_or_else(|| {
            debug!(kind = %self.kind, source = %source_key, "Could not find source");
            ReplicationError::SourceNotFound {
                kind: self.kind.clone(),
                key: source_key.clone(),
            }
        })?;
        let fingerprint = source.meta().resource_version.clone().ok_or_else(|| {
            ReplicationError::InvalidDeclaration {
                key: destination_key.clone(),
                reason: format!("source {source_key} has no resourceVersion"),
            }
        })?;

        let existing = self.store.get(&destination_key).await?;
        if let Some(destination) = &existing {
            if replicated_fingerprint(destination) == Some(fingerprint.as_str()) {
                debug!(
                    kind = %self.kind,
                    destination = %destination_key,
                    fingerprint = fingerprint.as_str(),
                    "Destination already up to date"
                );
                return Ok(Replication {
                    operation: Operation::Unchanged,
                    destination: destination.meta().clone(),
                });
            }
        }

        let owner = declaration.controller_owner_ref(&()).ok_or_else(|| {
            ReplicationError::InvalidDeclaration {
                key: destination_key.clone(),
                reason: "declaration has no uid to own the destination".to_string(),
            }
        })?;
        let replicated_at =
            chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

        let (operation, written) = match existing {
            None => {
                let mut destination = K::default();
                let meta = destination.meta_mut();
                meta.namespace = Some(destination_key.namespace.clone());
                meta.name = Some(destination_key.name.clone());
                K::mirror_payload(&source, &mut destination);
                Self::stamp(&mut destination, owner, &fingerprint, &replicated_at);
                (Operation::Created, self.store.create(&destination).await?)
            }
            Some(mut destination) => {
                // resourceVersion from the read above makes this a conditional write
                K::mirror_payload(&source, &mut destination);
                Self::stamp(&mut destination, owner, &fingerprint, &replicated_at);
                (Operation::Updated, self.store.replace(&destination).await?)
            }
        };

        info!(
            kind = %self.kind,
            source = %source_key,
            destination = %ObjectKey::of(&written),
            fingerprint = fingerprint.as_str(),
            operation = %operation,
            "Replicated {}", self.kind
        );

        Ok(Replication {
            operation,
            destination: written.meta().clone(),
        })
    }
}
