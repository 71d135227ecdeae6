//! # Trigger Index
//!
//! Maps a changed source object to the declarations that mirror it.
//!
//! Three equality predicates over `spec.source` (name, namespace, kind) are
//! indexed separately and intersected on lookup. The index is rebuilt from a
//! declaration snapshot on every query, so it can never drift from the
//! declaration set it was built from.

use crate::crd::{ReplicatedResource, SourceRef};
use crate::observability::metrics;
use crate::store::{DeclarationSnapshot, ObjectKey, StoreError};
use kube::Resource;
use kube_runtime::reflector::ObjectRef;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Secondary index over `spec.source`
#[derive(Debug, Default)]
struct FieldIndex {
    by_name: HashMap<String, BTreeSet<ObjectKey>>,
    by_namespace: HashMap<String, BTreeSet<ObjectKey>>,
    by_kind: HashMap<String, BTreeSet<ObjectKey>>,
}

impl FieldIndex {
    fn build<'a>(declarations: impl IntoIterator<Item = &'a ReplicatedResource>) -> Self {
        let mut index = Self::default();
        for declaration in declarations {
            index.insert(declaration);
        }
        index
    }

    fn insert(&mut self, declaration: &ReplicatedResource) {
        let key = declaration.key();
        let source = &declaration.spec.source;
        for (field, value) in [
            (&mut self.by_name, &source.name),
            (&mut self.by_namespace, &source.namespace),
            (&mut self.by_kind, &source.kind),
        ] {
            // empty fields are not indexed
            if !value.is_empty() {
                field.entry(value.clone()).or_default().insert(key.clone());
            }
        }
    }

    /// Keys matching all three fields exactly, sorted by (namespace, name)
    fn lookup(&self, source: &SourceRef) -> Vec<ObjectKey> {
        let (Some(names), Some(namespaces), Some(kinds)) = (
            self.by_name.get(&source.name),
            self.by_namespace.get(&source.namespace),
            self.by_kind.get(&source.kind),
        ) else {
            return Vec::new();
        };
        names
            .iter()
            .filter(|key| namespaces.contains(*key) && kinds.contains(*key))
            .cloned()
            .collect()
    }
}

/// Resolves source changes to declaration identities
#[derive(Clone)]
pub struct TriggerIndex<S> {
    declarations: S,
}

impl<S> std::fmt::Debug for TriggerIndex<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerIndex").finish_non_exhaustive()
    }
}

impl<S: DeclarationSnapshot> TriggerIndex<S> {
    pub fn new(declarations: S) -> Self {
        Self { declarations }
    }

    /// Declarations whose `spec.source` equals `source`
    ///
    /// # Errors
    ///
    /// Fails when the declaration snapshot cannot be read.
    pub fn try_resolve(&self, source: &SourceRef) -> Result<Vec<ObjectKey>, StoreError> {
        let snapshot = self.declarations.snapshot()?;
        Ok(FieldIndex::build(snapshot.iter().map(Arc::as_ref)).lookup(source))
    }

    /// Like [`try_resolve`](Self::try_resolve), but a failed lookup is logged,
    /// counted and treated as no matches
    pub fn resolve(&self, source: &SourceRef) -> Vec<ObjectKey> {
        match self.try_resolve(source) {
            Ok(keys) => keys,
            Err(e) => {
                warn!(source = %source, error = %e, "Failed to look up declarations for source");
                metrics::increment_trigger_lookup_failures();
                Vec::new()
            }
        }
    }

    /// Reconcile requests for the declarations mirroring a changed `object` of `kind`
    pub fn requests_for<K: Resource>(
        &self,
        kind: &str,
        object: &K,
    ) -> Vec<ObjectRef<ReplicatedResource>> {
        let meta = object.meta();
        let source = SourceRef::new(
            kind,
            meta.namespace.clone().unwrap_or_default(),
            meta.name.clone().unwrap_or_default(),
        );
        metrics::increment_trigger_lookups(kind);

        let keys = self.resolve(&source);
        if !keys.is_empty() {
            debug!(source = %source, matches = keys.len(), "Source change triggers declarations");
        }
        keys.into_iter()
            .map(|key| ObjectRef::new(&key.name).within(&key.namespace))
            .collect()
    }
}
