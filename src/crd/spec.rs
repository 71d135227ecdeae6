//! # ReplicatedResource Spec
//!
//! The declaration: which source object to mirror into a destination named after
//! the declaration itself.

use crate::store::ObjectKey;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};

/// ReplicatedResource Custom Resource Definition
///
/// Mirrors `spec.source` into an object of the same kind at the declaration's own
/// namespace/name. The destination is owned by the declaration and is garbage
/// collected with it.
///
/// # Example
///
/// ```yaml
/// apiVersion: utils.simopolis.xyz/v1alpha1
/// kind: ReplicatedResource
/// metadata:
///   name: test-replicated-secret
///   namespace: default
/// spec:
///   source:
///     kind: Secret
///     name: test-secret
///     namespace: shared
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "ReplicatedResource",
    group = "utils.simopolis.xyz",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::ReplicatedResourceStatus",
    shortname = "rr",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Kind", "type":"string", "jsonPath":".spec.source.kind"}"#,
    printcolumn = r#"{"name":"Source Namespace", "type":"string", "jsonPath":".spec.source.namespace"}"#,
    printcolumn = r#"{"name":"Source", "type":"string", "jsonPath":".spec.source.name"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ReplicatedResourceSpec {
    /// Object to mirror
    pub source: SourceRef,
}

/// Reference to the source object of a replication
///
/// The kind selects the replication capability; it is matched exactly
/// (`Secret`, not `secret`).
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Deserialize,
    Serialize,
    schemars::JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    /// Namespace of the source object
    #[serde(default)]
    pub namespace: String,
    /// Name of the source object
    #[serde(default)]
    pub name: String,
    /// Kind of the source object (e.g. "Secret")
    #[serde(default)]
    pub kind: String,
}

impl SourceRef {
    pub fn new(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            kind: kind.into(),
        }
    }

    #[must_use]
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }
}

impl std::fmt::Display for SourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

impl ReplicatedResource {
    /// Identity of the declaration, which is also the identity of its destination
    #[must_use]
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace().unwrap_or_default(), self.name_any())
    }

    /// Identity of the object being mirrored
    #[must_use]
    pub fn source_key(&self) -> ObjectKey {
        self.spec.source.key()
    }

    /// A declaration whose source is itself would overwrite its own source on every write.
    #[must_use]
    pub fn is_self_referential(&self) -> bool {
        self.source_key() == self.key()
    }
}
