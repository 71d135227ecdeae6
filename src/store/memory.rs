//! # In-Memory Stores
//!
//! Process-local implementations of the store traits with API-server-like
//! semantics: every write bumps `metadata.resourceVersion`, replaces are
//! conditioned on it, and creates of existing objects conflict. Used by the
//! test suites and for dry runs without a cluster.

use super::{DeclarationSnapshot, DeclarationStore, ObjectKey, ObjectStore, StoreError};
use crate::crd::{ReplicatedResource, ReplicatedResourceStatus};
use async_trait::async_trait;
use kube::Resource;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug)]
struct ObjectState<K> {
    objects: BTreeMap<ObjectKey, K>,
    next_version: u64,
    writes: usize,
    unavailable: bool,
}

/// In-memory objects of kind `K`
#[derive(Debug)]
pub struct MemoryObjectStore<K> {
    inner: Arc<RwLock<ObjectState<K>>>,
}

impl<K> Clone for MemoryObjectStore<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K> Default for MemoryObjectStore<K> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(ObjectState {
                objects: BTreeMap::new(),
                next_version: 1,
                writes: 0,
                unavailable: false,
            })),
        }
    }
}

impl<K> MemoryObjectStore<K>
where
    K: Resource + Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, ObjectState<K>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ObjectState<K>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Upsert an object as an external writer would, assigning a fresh resourceVersion.
    /// Not counted in [`writes`](Self::writes).
    pub fn insert(&self, mut object: K) -> K {
        let mut state = self.write();
        stamp_version(&mut object, &mut state.next_version);
        let meta = object.meta_mut();
        if meta.uid.is_none() {
            meta.uid = meta.resource_version.as_ref().map(|v| format!("uid-{v}"));
        }
        state.objects.insert(ObjectKey::of(&object), object.clone());
        object
    }

    /// Current stored object, bypassing availability simulation
    #[must_use]
    pub fn peek(&self, key: &ObjectKey) -> Option<K> {
        self.read().objects.get(key).cloned()
    }

    /// Number of successful `create` and `replace` calls
    #[must_use]
    pub fn writes(&self) -> usize {
        self.read().writes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().objects.is_empty()
    }

    /// Make every trait call fail with [`StoreError::Unavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.write().unavailable = unavailable;
    }
}

fn stamp_version<K: Resource>(object: &mut K, next_version: &mut u64) {
    object.meta_mut().resource_version = Some(next_version.to_string());
    *next_version += 1;
}

fn unavailable() -> StoreError {
    StoreError::Unavailable("in-memory store marked unavailable".to_string())
}

#[async_trait]
impl<K> ObjectStore<K> for MemoryObjectStore<K>
where
    K: Resource + Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        let state = self.read();
        if state.unavailable {
            return Err(unavailable());
        }
        Ok(state.objects.get(key).cloned())
    }

    async fn create(&self, object: &K) -> Result<K, StoreError> {
        let mut state = self.write();
        if state.unavailable {
            return Err(unavailable());
        }
        let key = ObjectKey::of(object);
        if state.objects.contains_key(&key) {
            return Err(StoreError::Conflict {
                key,
                message: "object already exists".to_string(),
            });
        }
        let mut created = object.clone();
        stamp_version(&mut created, &mut state.next_version);
        let meta = created.meta_mut();
        meta.uid = meta.resource_version.as_ref().map(|v| format!("uid-{v}"));
        state.objects.insert(key, created.clone());
        state.writes += 1;
        Ok(created)
    }

    async fn replace(&self, object: &K) -> Result<K, StoreError> {
        let mut state = self.write();
        if state.unavailable {
            return Err(unavailable());
        }
        let key = ObjectKey::of(object);
        let Some(current) = state.objects.get(&key) else {
            return Err(StoreError::NotFound { key });
        };
        let expected = object.meta().resource_version.as_deref();
        let actual = current.meta().resource_version.as_deref();
        if expected.is_some() && expected != actual {
            return Err(StoreError::Conflict {
                message: format!(
                    "resourceVersion {} does not match stored {}",
                    expected.unwrap_or_default(),
                    actual.unwrap_or_default()
                ),
                key,
            });
        }
        let uid = current.meta().uid.clone();
        let mut replaced = object.clone();
        stamp_version(&mut replaced, &mut state.next_version);
        replaced.meta_mut().uid = uid;
        state.objects.insert(key, replaced.clone());
        state.writes += 1;
        Ok(replaced)
    }
}

#[derive(Debug)]
struct DeclarationState {
    declarations: BTreeMap<ObjectKey, ReplicatedResource>,
    next_version: u64,
    status_writes: usize,
    unavailable: bool,
    reject_status_writes: bool,
}

/// In-memory ReplicatedResource declarations
#[derive(Debug, Clone)]
pub struct MemoryDeclarationStore {
    inner: Arc<RwLock<DeclarationState>>,
}

impl Default for MemoryDeclarationStore {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(DeclarationState {
                declarations: BTreeMap::new(),
                next_version: 1,
                status_writes: 0,
                unavailable: false,
                reject_status_writes: false,
            })),
        }
    }
}

impl MemoryDeclarationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, DeclarationState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DeclarationState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create or update a declaration as a user would.
    /// Assigns a resourceVersion, a uid and generation 1 when missing.
    pub fn insert(&self, mut declaration: ReplicatedResource) -> ReplicatedResource {
        let mut state = self.write();
        stamp_version(&mut declaration, &mut state.next_version);
        let meta = &mut declaration.metadata;
        if meta.uid.is_none() {
            meta.uid = meta.resource_version.as_ref().map(|v| format!("rr-uid-{v}"));
        }
        meta.generation.get_or_insert(1);
        state
            .declarations
            .insert(declaration.key(), declaration.clone());
        declaration
    }

    pub fn remove(&self, key: &ObjectKey) -> Option<ReplicatedResource> {
        self.write().declarations.remove(key)
    }

    #[must_use]
    pub fn peek(&self, key: &ObjectKey) -> Option<ReplicatedResource> {
        self.read().declarations.get(key).cloned()
    }

    /// Number of successful status writes
    #[must_use]
    pub fn status_writes(&self) -> usize {
        self.read().status_writes
    }

    /// Make every call fail with [`StoreError::Unavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.write().unavailable = unavailable;
    }

    /// Make status writes fail with [`StoreError::Conflict`]
    pub fn set_reject_status_writes(&self, reject: bool) {
        self.write().reject_status_writes = reject;
    }
}

#[async_trait]
impl DeclarationStore for MemoryDeclarationStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<ReplicatedResource>, StoreError> {
        let state = self.read();
        if state.unavailable {
            return Err(unavailable());
        }
        Ok(state.declarations.get(key).cloned())
    }

    async fn write_status(
        &self,
        declaration: &ReplicatedResource,
        status: &ReplicatedResourceStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.write();
        if state.unavailable {
            return Err(unavailable());
        }
        let key = declaration.key();
        if state.reject_status_writes {
            return Err(StoreError::Conflict {
                key,
                message: "status writes rejected".to_string(),
            });
        }
        let DeclarationState {
            declarations,
            next_version,
            status_writes,
            ..
        } = &mut *state;
        let Some(stored) = declarations.get_mut(&key) else {
            return Err(StoreError::NotFound { key });
        };
        let expected = declaration.metadata.resource_version.as_deref();
        if expected.is_some() && expected != stored.metadata.resource_version.as_deref() {
            return Err(StoreError::Conflict {
                key,
                message: "declaration modified since it was read".to_string(),
            });
        }
        stored.status = Some(status.clone());
        stamp_version(stored, next_version);
        *status_writes += 1;
        Ok(())
    }
}

impl DeclarationSnapshot for MemoryDeclarationStore {
    fn snapshot(&self) -> Result<Vec<Arc<ReplicatedResource>>, StoreError> {
        let state = self.read();
        if state.unavailable {
            return Err(unavailable());
        }
        Ok(state
            .declarations
            .values()
            .cloned()
            .map(Arc::new)
            .collect())
    }
}
