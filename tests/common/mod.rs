//! Common test utilities for reconciler integration tests
//!
//! Builds a reconciler over the in-memory stores with the Secret replicator
//! registered, plus fixtures for secrets and declarations.

#![allow(dead_code, reason = "not every test binary uses every fixture")]

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use resource_replication_controller::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const SOURCE_PAYLOAD: &str = "dGhpcyBpcyBhIHRlc3Qu";
pub const UPDATED_PAYLOAD: &str = "dGhpcyBpcyBhbm90aGVyIHRlc3Qu";

/// Decode a base64 Secret payload the way the API server stores it
pub fn decode(value: &str) -> ByteString {
    ByteString(STANDARD.decode(value).expect("fixture payload is valid base64"))
}

pub fn secret(namespace: &str, name: &str, payload: &str) -> Secret {
    let mut secret = Secret {
        type_: Some("Opaque".to_string()),
        data: Some(BTreeMap::from([("test".to_string(), decode(payload))])),
        ..Secret::default()
    };
    secret.metadata.namespace = Some(namespace.to_string());
    secret.metadata.name = Some(name.to_string());
    secret
}

pub fn declaration(namespace: &str, name: &str, source: SourceRef) -> ReplicatedResource {
    let mut rr = ReplicatedResource::new(name, ReplicatedResourceSpec { source });
    rr.metadata.namespace = Some(namespace.to_string());
    rr
}

pub struct Harness {
    pub declarations: MemoryDeclarationStore,
    pub secrets: MemoryObjectStore<Secret>,
    pub reconciler: Arc<Reconciler>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ControllerConfig::default())
    }

    pub fn with_config(config: ControllerConfig) -> Self {
        let secrets = MemoryObjectStore::<Secret>::new();
        Self::with_registry(
            secrets.clone(),
            ReplicatorRegistry::new().with(Arc::new(ObjectReplicator::<Secret, _>::new(secrets))),
            config,
        )
    }

    pub fn with_registry(
        secrets: MemoryObjectStore<Secret>,
        registry: ReplicatorRegistry,
        config: ControllerConfig,
    ) -> Self {
        let declarations = MemoryDeclarationStore::new();
        let reconciler = Arc::new(Reconciler::new(
            Arc::new(declarations.clone()),
            registry,
            config,
        ));
        Self {
            declarations,
            secrets,
            reconciler,
        }
    }

    pub async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome, ReconcilerError> {
        self.reconciler.reconcile_declaration(key).await
    }

    pub fn status(&self, key: &ObjectKey) -> Option<ReplicatedResourceStatus> {
        self.declarations.peek(key).and_then(|rr| rr.status)
    }
}
