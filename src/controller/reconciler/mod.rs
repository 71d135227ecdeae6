//! # Reconciler
//!
//! Drives one declaration towards its desired state:
//!
//! 1. Fetch the declaration (gone: nothing to do)
//! 2. Drop it if its source is itself
//! 3. Dispatch to the replicator registered for `spec.source.kind`
//! 4. Record the outcome in status, unless the destination was already up to date
//!    and the status already says Completed
//!
//! Retries are not handled here. Errors returned from [`reconcile`] are
//! rescheduled by the runtime error policy with per-declaration backoff.

mod reconcile;
pub mod status;
mod types;

pub use reconcile::{action_for, reconcile};
pub use types::{BackoffState, ReconcileOutcome, Reconciler, ReconcilerError};
