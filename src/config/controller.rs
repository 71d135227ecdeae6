//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use super::{env_lookup, var_or_default};
use crate::constants::{
    DEFAULT_BACKOFF_MAX_SECS, DEFAULT_BACKOFF_MIN_SECS, DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
    DEFAULT_RECONCILE_TIMEOUT_SECS, DEFAULT_REPLICATED_KINDS, DEFAULT_VERIFY_REQUEUE_MS,
    DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS, DEFAULT_WATCH_RESTART_DELAY_SECS,
};
use std::time::Duration;

/// Controller-level configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Delay before re-checking a declaration right after its destination was written.
    /// `0` waits for the next change instead.
    pub verify_requeue_ms: u64,
    /// Upper bound for a single reconcile attempt (seconds)
    pub reconcile_timeout_secs: u64,
    /// First error backoff (seconds)
    pub backoff_min_secs: u64,
    /// Error backoff cap (seconds)
    pub backoff_max_secs: u64,
    /// Watch stream restart delay after unknown errors (seconds)
    pub watch_restart_delay_secs: u64,
    /// Watch stream restart delay after stream ends (seconds)
    pub watch_restart_delay_after_end_secs: u64,
    /// Declarations reconciled in parallel
    pub max_concurrent_reconciliations: u16,
    /// Kinds to register replicators for
    pub replicated_kinds: Vec<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            verify_requeue_ms: DEFAULT_VERIFY_REQUEUE_MS,
            reconcile_timeout_secs: DEFAULT_RECONCILE_TIMEOUT_SECS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            replicated_kinds: DEFAULT_REPLICATED_KINDS
                .iter()
                .map(|k| (*k).to_string())
                .collect(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            verify_requeue_ms: var_or_default(
                &lookup,
                "VERIFY_REQUEUE_MS",
                defaults.verify_requeue_ms,
            ),
            reconcile_timeout_secs: var_or_default(
                &lookup,
                "RECONCILE_TIMEOUT_SECS",
                defaults.reconcile_timeout_secs,
            ),
            backoff_min_secs: var_or_default(&lookup, "BACKOFF_MIN_SECS", defaults.backoff_min_secs),
            backoff_max_secs: var_or_default(&lookup, "BACKOFF_MAX_SECS", defaults.backoff_max_secs),
            watch_restart_delay_secs: var_or_default(
                &lookup,
                "WATCH_RESTART_DELAY_SECS",
                defaults.watch_restart_delay_secs,
            ),
            watch_restart_delay_after_end_secs: var_or_default(
                &lookup,
                "WATCH_RESTART_DELAY_AFTER_END_SECS",
                defaults.watch_restart_delay_after_end_secs,
            ),
            max_concurrent_reconciliations: var_or_default(
                &lookup,
                "MAX_CONCURRENT_RECONCILIATIONS",
                defaults.max_concurrent_reconciliations,
            ),
            replicated_kinds: lookup("REPLICATED_KINDS")
                .map(|v| parse_kinds(&v))
                .filter(|kinds| !kinds.is_empty())
                .unwrap_or(defaults.replicated_kinds),
        }
    }

    /// Requeue delay after a destination write, `None` when disabled
    #[must_use]
    pub fn verify_requeue(&self) -> Option<Duration> {
        (self.verify_requeue_ms > 0).then(|| Duration::from_millis(self.verify_requeue_ms))
    }

    #[must_use]
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    #[must_use]
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    #[must_use]
    pub fn watch_restart_delay_after_end_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_after_end_secs)
    }
}

/// Comma-separated kind list; blanks dropped, duplicates removed, order kept
fn parse_kinds(value: &str) -> Vec<String> {
    let mut kinds: Vec<String> = Vec::new();
    for kind in value.split(',').map(str::trim).filter(|k| !k.is_empty()) {
        if !kinds.iter().any(|k| k == kind) {
            kinds.push(kind.to_string());
        }
    }
    kinds
}
