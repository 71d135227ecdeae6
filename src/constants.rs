//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Annotation stamped on every destination with the RFC3339 time of the last write
pub const REPLICATED_AT_ANNOTATION: &str = "replicated-resource.simopolis.xyz/updated";

/// Annotation stamped on every destination with the source fingerprint of the last write
pub const REPLICATED_FROM_VERSION_ANNOTATION: &str = "replicated-resource.simopolis.xyz/version";

/// Field manager used for status patches
pub const FIELD_MANAGER: &str = "resource-replication-controller";

/// Condition type carried by every status condition
pub const CONDITION_TYPE_COMPLETE: &str = "Complete";

/// Condition reason for a successful mutating replication
pub const REASON_REPLICATED: &str = "Replicated";

/// Condition reason for any failed replication
pub const REASON_ERROR: &str = "Error";

/// Condition message for a successful mutating replication
pub const MESSAGE_REPLICATED: &str = "Successfully Replicated";

/// Kinds registered when `REPLICATED_KINDS` is not set
pub const DEFAULT_REPLICATED_KINDS: &[&str] = &["Secret"];

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default delay before the single re-check that follows a write to a destination
pub const DEFAULT_VERIFY_REQUEUE_MS: u64 = 500;

/// Default upper bound for a single reconcile attempt (seconds)
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 30;

/// Default minimum error backoff (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 1;

/// Default maximum error backoff (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default delay before restarting watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// Default number of declarations reconciled in parallel
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;
