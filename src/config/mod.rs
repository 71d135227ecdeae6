//! # Configuration
//!
//! Environment-driven settings. Every value has a default in
//! [`constants`](crate::constants), so the controller starts with no
//! environment at all.

mod controller;
mod server;

pub use controller::ControllerConfig;
pub use server::ServerConfig;

use tracing::warn;

/// Read a variable through `lookup` and parse it, falling back to `default`
/// when it is unset or does not parse
fn var_or_default<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    raw.trim().parse().unwrap_or_else(|_| {
        warn!(key, value = raw.as_str(), "Ignoring unparsable setting, using default");
        default
    })
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
