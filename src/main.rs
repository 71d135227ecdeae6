//! # Resource Replication Controller
//!
//! Kubernetes controller that keeps destination objects in sync with source
//! objects, as declared by `ReplicatedResource` custom resources.
//!
//! ```yaml
//! apiVersion: utils.simopolis.xyz/v1alpha1
//! kind: ReplicatedResource
//! metadata:
//!   name: db-credentials
//!   namespace: app
//! spec:
//!   source:
//!     kind: Secret
//!     name: db-credentials
//!     namespace: shared
//! ```
//!
//! The destination (`app/db-credentials`) is owned by the declaration and is
//! garbage collected with it.

use anyhow::Result;
use resource_replication_controller::runtime::{initialize, run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;

    run_watch_loop(
        init.client,
        init.reconciler,
        init.server_state,
        init.controller_config,
    )
    .await
}
