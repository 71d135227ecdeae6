//! Resource Replication Controller Library
//!
//! Keeps a destination object in sync with a source object, driven by a
//! `ReplicatedResource` declaration. The reconciliation core lives in
//! [`controller`] and [`replicator`]; [`runtime`] wires it into
//! `kube_runtime::Controller`.
//!
//! ## Quick Start
//!
//! ```rust
//! use resource_replication_controller::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod replicator;
pub mod runtime;
pub mod store;
