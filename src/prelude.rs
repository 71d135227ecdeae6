//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use resource_replication_controller::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Replication capabilities
pub use crate::replicator::{
    Mirror, ObjectReplicator, Operation, Replication, ReplicationError, Replicator,
    ReplicatorRegistry,
};

// Reconciler types
pub use crate::controller::reconciler::{reconcile, ReconcileOutcome, Reconciler, ReconcilerError};
pub use crate::controller::trigger::TriggerIndex;

// Stores
pub use crate::store::{
    DeclarationSnapshot, DeclarationStore, KubeDeclarationStore, KubeObjectStore,
    MemoryDeclarationStore, MemoryObjectStore, ObjectKey, ObjectStore, StoreError,
};

// Config types
pub use crate::config::{ControllerConfig, ServerConfig};
