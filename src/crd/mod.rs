//! # Custom Resource Definitions
//!
//! CRD types for the Resource Replication Controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `ReplicatedResource` and its source reference
//! - `status.rs` - Status and condition types written by the reconciler

mod spec;
mod status;

pub use spec::{ReplicatedResource, ReplicatedResourceSpec, SourceRef};
pub use status::{Condition, ConditionStatus, ReplicatedResourceStatus, ReplicationPhase};
