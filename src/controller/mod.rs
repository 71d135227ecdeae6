//! # Controller
//!
//! Core controller modules for the Resource Replication Controller.
//!
//! - `backoff`: Fibonacci backoff for failed reconciliations
//! - `reconciler`: Per-declaration reconciliation and status writing
//! - `server`: HTTP server for metrics and health checks
//! - `trigger`: Source change to declaration lookup

pub mod backoff;
pub mod reconciler;
pub mod server;
pub mod trigger;
