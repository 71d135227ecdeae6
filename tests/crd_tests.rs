//! # CRD Tests
//!
//! Checks the generated CustomResourceDefinition and the declaration
//! wire format.

use kube::CustomResourceExt;
use resource_replication_controller::prelude::*;

#[test]
fn test_crd_identity() {
    let crd = ReplicatedResource::crd();

    assert_eq!(
        crd.metadata.name.as_deref(),
        Some("replicatedresources.utils.simopolis.xyz")
    );
    assert_eq!(crd.spec.group, "utils.simopolis.xyz");
    assert_eq!(crd.spec.scope, "Namespaced");
    assert_eq!(crd.spec.names.kind, "ReplicatedResource");
    assert_eq!(
        crd.spec.names.short_names,
        Some(vec!["rr".to_string()])
    );
}

#[test]
fn test_crd_version_has_status_subresource() {
    let crd = ReplicatedResource::crd();
    let version = &crd.spec.versions[0];

    assert_eq!(version.name, "v1alpha1");
    assert!(version.served);
    assert!(version.storage);
    let columns: Vec<&str> = version
        .additional_printer_columns
        .iter()
        .flatten()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(columns, ["Phase", "Kind", "Source Namespace", "Source", "Age"]);
    assert!(version
        .subresources
        .as_ref()
        .and_then(|s| s.status.as_ref())
        .is_some());
}

#[test]
fn test_declaration_deserializes_from_manifest() {
    let manifest = r"
apiVersion: utils.simopolis.xyz/v1alpha1
kind: ReplicatedResource
metadata:
  name: test-replicated-secret
  namespace: default
spec:
  source:
    kind: Secret
    namespace: default
    name: test-secret
";
    let rr: ReplicatedResource = serde_yaml::from_str(manifest).unwrap();

    assert_eq!(rr.spec.source, SourceRef::new("Secret", "default", "test-secret"));
    assert_eq!(rr.key(), ObjectKey::new("default", "test-replicated-secret"));
    assert!(rr.status.is_none());
}

#[test]
fn test_status_serializes_camel_case() {
    let status = ReplicatedResourceStatus {
        phase: Some(ReplicationPhase::Completed),
        conditions: vec![],
        observed_generation: Some(3),
    };

    let value = serde_json::to_value(&status).unwrap();

    assert_eq!(value["phase"], "Completed");
    assert_eq!(value["observedGeneration"], 3);
}
