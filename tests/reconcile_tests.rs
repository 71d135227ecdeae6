//! # Reconciler Integration Tests
//!
//! Drives the reconciler against in-memory stores through the documented
//! scenarios: first replication, source update, missing source, self
//! reference, unsupported kind and idempotent re-runs.

mod common;

use async_trait::async_trait;
use common::{declaration, decode, secret, Harness, SOURCE_PAYLOAD, UPDATED_PAYLOAD};
use k8s_openapi::api::core::v1::Secret;
use kube::Resource;
use kube_runtime::controller::Action;
use resource_replication_controller::constants::{
    REPLICATED_AT_ANNOTATION, REPLICATED_FROM_VERSION_ANNOTATION,
};
use resource_replication_controller::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn source() -> SourceRef {
    SourceRef::new("Secret", "default", "test-secret")
}

fn destination_key() -> ObjectKey {
    ObjectKey::new("default", "test-replicated-secret")
}

/// Harness with the scenario source secret and declaration in place
fn scenario() -> Harness {
    let harness = Harness::new();
    harness
        .secrets
        .insert(secret("default", "test-secret", SOURCE_PAYLOAD));
    harness.declarations.insert(declaration(
        "default",
        "test-replicated-secret",
        source(),
    ));
    harness
}

#[tokio::test]
async fn test_first_reconcile_creates_destination() {
    let harness = scenario();
    let key = destination_key();

    let outcome = harness.reconcile(&key).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Replicated(Operation::Created));

    let source = harness
        .secrets
        .peek(&ObjectKey::new("default", "test-secret"))
        .unwrap();
    let destination = harness.secrets.peek(&key).unwrap();
    assert_eq!(destination.data, source.data);
    assert_eq!(
        destination.data.as_ref().unwrap()["test"],
        decode(SOURCE_PAYLOAD)
    );
    assert_eq!(destination.type_.as_deref(), Some("Opaque"));

    let annotations = destination.metadata.annotations.as_ref().unwrap();
    assert_eq!(
        annotations.get(REPLICATED_FROM_VERSION_ANNOTATION),
        source.metadata.resource_version.as_ref()
    );
    let replicated_at = &annotations[REPLICATED_AT_ANNOTATION];
    assert!(
        chrono::DateTime::parse_from_rfc3339(replicated_at).is_ok(),
        "not RFC3339: {replicated_at}"
    );
    assert!(replicated_at.ends_with('Z'));

    let status = harness.status(&key).unwrap();
    assert_eq!(status.phase, Some(ReplicationPhase::Completed));
    assert_eq!(status.conditions.len(), 1);
    assert_eq!(status.conditions[0].status, ConditionStatus::True);
    assert_eq!(status.conditions[0].reason.as_deref(), Some("Replicated"));
    assert_eq!(
        status.conditions[0].message.as_deref(),
        Some("Successfully Replicated")
    );
}

#[tokio::test]
async fn test_source_update_rewrites_destination_once() {
    let harness = scenario();
    let key = destination_key();
    harness.reconcile(&key).await.unwrap();
    let writes_before = harness.secrets.writes();
    let first_version = harness.secrets.peek(&key).unwrap().metadata.annotations.unwrap()
        [REPLICATED_FROM_VERSION_ANNOTATION]
        .clone();

    let updated = harness
        .secrets
        .insert(secret("default", "test-secret", UPDATED_PAYLOAD));
    let outcome = harness.reconcile(&key).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Replicated(Operation::Updated));
    assert_eq!(harness.secrets.writes(), writes_before + 1);
    let destination = harness.secrets.peek(&key).unwrap();
    assert_eq!(
        destination.data.as_ref().unwrap()["test"],
        decode(UPDATED_PAYLOAD)
    );
    let version = &destination.metadata.annotations.as_ref().unwrap()
        [REPLICATED_FROM_VERSION_ANNOTATION];
    assert_ne!(version, &first_version);
    assert_eq!(Some(version), updated.metadata.resource_version.as_ref());
}

#[tokio::test]
async fn test_missing_source_fails_with_its_identity() {
    let harness = Harness::new();
    let key = ObjectKey::new("default", "orphan");
    harness.declarations.insert(declaration(
        "default",
        "orphan",
        SourceRef::new("Secret", "shared", "does-not-exist"),
    ));

    let outcome = harness.reconcile(&key).await.unwrap();

    assert!(matches!(outcome, ReconcileOutcome::Failed { .. }));
    assert!(harness.secrets.is_empty());
    let status = harness.status(&key).unwrap();
    assert_eq!(status.phase, Some(ReplicationPhase::Failed));
    assert_eq!(status.conditions[0].status, ConditionStatus::False);
    assert_eq!(status.conditions[0].reason.as_deref(), Some("Error"));
    assert!(status.conditions[0]
        .message
        .as_deref()
        .unwrap()
        .contains("shared/does-not-exist"));
}

#[tokio::test]
async fn test_self_reference_writes_nothing() {
    let harness = Harness::new();
    let key = ObjectKey::new("default", "loop");
    harness
        .secrets
        .insert(secret("default", "loop", SOURCE_PAYLOAD));
    harness.declarations.insert(declaration(
        "default",
        "loop",
        SourceRef::new("Secret", "default", "loop"),
    ));

    let outcome = harness.reconcile(&key).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::SelfReferential);
    assert_eq!(harness.secrets.writes(), 0);
    assert!(harness.status(&key).is_none());
    assert_eq!(harness.declarations.status_writes(), 0);
}

#[tokio::test]
async fn test_self_reference_checked_before_dispatch() {
    let harness = Harness::new();
    let key = ObjectKey::new("default", "settings");
    harness.declarations.insert(declaration(
        "default",
        "settings",
        SourceRef::new("ConfigMap", "default", "settings"),
    ));

    let outcome = harness.reconcile(&key).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::SelfReferential);
    assert!(harness.status(&key).is_none());
    assert_eq!(harness.declarations.status_writes(), 0);
}

#[tokio::test]
async fn test_unsupported_kind_is_reported() {
    let harness = Harness::new();
    let key = ObjectKey::new("default", "settings");
    harness.declarations.insert(declaration(
        "default",
        "settings",
        SourceRef::new("ConfigMap", "shared", "settings"),
    ));

    let outcome = harness.reconcile(&key).await.unwrap();

    assert_eq!(
        outcome,
        ReconcileOutcome::Failed {
            message: "Unsupported kind ConfigMap".to_string()
        }
    );
    let status = harness.status(&key).unwrap();
    assert_eq!(status.phase, Some(ReplicationPhase::Failed));
    assert_eq!(
        status.conditions[0].message.as_deref(),
        Some("Unsupported kind ConfigMap")
    );
}

#[tokio::test]
async fn test_back_to_back_reconciles_are_idempotent() {
    let harness = scenario();
    let key = destination_key();

    harness.reconcile(&key).await.unwrap();
    let writes = harness.secrets.writes();
    let status_writes = harness.declarations.status_writes();
    let status = harness.status(&key);

    let outcome = harness.reconcile(&key).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Unchanged);
    assert_eq!(harness.secrets.writes(), writes);
    assert_eq!(harness.declarations.status_writes(), status_writes);
    assert_eq!(harness.status(&key), status);
}

#[tokio::test]
async fn test_destination_owned_by_declaration() {
    let harness = scenario();
    let key = destination_key();
    harness.reconcile(&key).await.unwrap();

    let rr = harness.declarations.peek(&key).unwrap();
    let owners = harness
        .secrets
        .peek(&key)
        .unwrap()
        .metadata
        .owner_references
        .unwrap();

    assert_eq!(owners.len(), 1);
    let owner = &owners[0];
    assert_eq!(owner.kind, "ReplicatedResource");
    assert_eq!(owner.api_version, "utils.simopolis.xyz/v1alpha1");
    assert_eq!(owner.name, "test-replicated-secret");
    assert_eq!(Some(&owner.uid), rr.meta().uid.as_ref());
    assert_eq!(owner.controller, Some(true));
    assert_eq!(owner.block_owner_deletion, Some(true));
}

#[tokio::test]
async fn test_update_preserves_foreign_annotations() {
    let harness = scenario();
    let key = destination_key();
    harness.reconcile(&key).await.unwrap();

    let mut destination = harness.secrets.peek(&key).unwrap();
    destination
        .metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert("team".to_string(), "payments".to_string());
    harness.secrets.insert(destination);
    harness
        .secrets
        .insert(secret("default", "test-secret", UPDATED_PAYLOAD));

    harness.reconcile(&key).await.unwrap();

    let annotations = harness
        .secrets
        .peek(&key)
        .unwrap()
        .metadata
        .annotations
        .unwrap();
    assert_eq!(annotations.get("team").map(String::as_str), Some("payments"));
}

#[tokio::test]
async fn test_deleted_declaration_is_a_no_op() {
    let harness = Harness::new();

    let outcome = harness
        .reconcile(&ObjectKey::new("default", "gone"))
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::DeclarationMissing);
}

#[tokio::test]
async fn test_unreadable_declaration_is_an_error() {
    let harness = scenario();
    harness.declarations.set_unavailable(true);

    let err = harness.reconcile(&destination_key()).await.unwrap_err();

    assert!(matches!(err, ReconcilerError::DeclarationRead { .. }));
}

#[tokio::test]
async fn test_store_outage_is_reported_and_retried() {
    let harness = scenario();
    let key = destination_key();
    harness.secrets.set_unavailable(true);

    let err = harness.reconcile(&key).await.unwrap_err();

    assert!(matches!(err, ReconcilerError::Replication { .. }));
    let status = harness.status(&key).unwrap();
    assert_eq!(status.phase, Some(ReplicationPhase::Failed));
}

#[tokio::test]
async fn test_status_write_failure_is_an_error() {
    let harness = scenario();
    harness.declarations.set_reject_status_writes(true);

    let err = harness.reconcile(&destination_key()).await.unwrap_err();

    assert!(matches!(err, ReconcilerError::StatusWrite { .. }));
    // the destination write itself went through
    assert!(harness.secrets.peek(&destination_key()).is_some());
}

#[tokio::test]
async fn test_retry_after_rejected_status_write_completes() {
    let harness = scenario();
    let key = destination_key();
    harness.declarations.set_reject_status_writes(true);

    let err = harness.reconcile(&key).await.unwrap_err();
    assert!(matches!(err, ReconcilerError::StatusWrite { .. }));
    assert!(harness.status(&key).is_none());

    harness.declarations.set_reject_status_writes(false);
    let writes = harness.secrets.writes();
    let outcome = harness.reconcile(&key).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Unchanged);
    assert_eq!(harness.secrets.writes(), writes);
    let status = harness.status(&key).unwrap();
    assert_eq!(status.phase, Some(ReplicationPhase::Completed));
    assert_eq!(status.conditions[0].status, ConditionStatus::True);
    assert_eq!(status.conditions[0].reason.as_deref(), Some("Replicated"));

    // and once recorded, nothing more is written
    let status_writes = harness.declarations.status_writes();
    harness.reconcile(&key).await.unwrap();
    assert_eq!(harness.declarations.status_writes(), status_writes);
}

#[tokio::test]
async fn test_stale_failure_replaced_when_destination_in_sync() {
    let harness = scenario();
    let key = destination_key();
    harness.reconcile(&key).await.unwrap();

    // a failure recorded while the source store was briefly down
    harness.secrets.set_unavailable(true);
    harness.reconcile(&key).await.unwrap_err();
    assert_eq!(
        harness.status(&key).unwrap().phase,
        Some(ReplicationPhase::Failed)
    );
    harness.secrets.set_unavailable(false);

    let outcome = harness.reconcile(&key).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Unchanged);
    assert_eq!(
        harness.status(&key).unwrap().phase,
        Some(ReplicationPhase::Completed)
    );
}

/// Store that lets another writer touch the destination between read and write
struct RacingStore {
    inner: MemoryObjectStore<Secret>,
}

#[async_trait]
impl ObjectStore<Secret> for RacingStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<Secret>, StoreError> {
        self.inner.get(key).await
    }

    async fn create(&self, object: &Secret) -> Result<Secret, StoreError> {
        self.inner.create(object).await
    }

    async fn replace(&self, object: &Secret) -> Result<Secret, StoreError> {
        if let Some(current) = self.inner.peek(&ObjectKey::of(object)) {
            self.inner.insert(current);
        }
        self.inner.replace(object).await
    }
}

#[tokio::test]
async fn test_concurrent_destination_change_conflicts() {
    let secrets = MemoryObjectStore::<Secret>::new();
    let registry = ReplicatorRegistry::new().with(Arc::new(ObjectReplicator::<Secret, _>::new(
        RacingStore {
            inner: secrets.clone(),
        },
    )));
    let harness = Harness::with_registry(secrets, registry, ControllerConfig::default());
    let key = destination_key();
    harness
        .secrets
        .insert(secret("default", "test-secret", SOURCE_PAYLOAD));
    harness.secrets.insert(secret(
        "default",
        "test-replicated-secret",
        UPDATED_PAYLOAD,
    ));
    harness.declarations.insert(declaration(
        "default",
        "test-replicated-secret",
        source(),
    ));

    let err = harness.reconcile(&key).await.unwrap_err();

    match err {
        ReconcilerError::Replication {
            source: ReplicationError::Store(store_error),
            ..
        } => assert!(store_error.is_conflict()),
        other => panic!("expected conflict, got {other}"),
    }
    assert_eq!(harness.secrets.writes(), 0);
}

#[tokio::test]
async fn test_kube_entry_point_requeues_once_after_write() {
    let harness = scenario();
    let key = destination_key();

    let rr = Arc::new(harness.declarations.peek(&key).unwrap());
    let action = reconcile(Arc::clone(&rr), Arc::clone(&harness.reconciler))
        .await
        .unwrap();
    assert_eq!(action, Action::requeue(Duration::from_millis(500)));

    // an in-sync declaration is left alone until something changes
    for _ in 0..5 {
        let action = reconcile(Arc::clone(&rr), Arc::clone(&harness.reconciler))
            .await
            .unwrap();
        assert_eq!(action, Action::await_change());
    }
    assert_eq!(harness.secrets.writes(), 1);
}

/// Replicator that never finishes in time
struct StalledReplicator;

#[async_trait]
impl Replicator for StalledReplicator {
    fn kind(&self) -> &str {
        "Stalled"
    }

    fn api_resource(&self) -> kube::discovery::ApiResource {
        kube::discovery::ApiResource::erase::<Secret>(&())
    }

    async fn replicate(
        &self,
        _declaration: &ReplicatedResource,
    ) -> Result<Replication, ReplicationError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(ReplicationError::UnsupportedKind("Stalled".to_string()))
    }
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_is_bounded_by_timeout() {
    let harness = Harness::with_registry(
        MemoryObjectStore::new(),
        ReplicatorRegistry::new().with(Arc::new(StalledReplicator)),
        ControllerConfig {
            reconcile_timeout_secs: 1,
            ..ControllerConfig::default()
        },
    );
    let key = ObjectKey::new("default", "slow");
    let rr = Arc::new(harness.declarations.insert(declaration(
        "default",
        "slow",
        SourceRef::new("Stalled", "default", "source"),
    )));

    let err = reconcile(rr, Arc::clone(&harness.reconciler))
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcilerError::Timeout { .. }));
    assert_eq!(err.key(), &key);
    assert!(harness.status(&key).is_none());
}
