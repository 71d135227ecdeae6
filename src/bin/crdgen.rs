//! # CRD Generator
//!
//! Prints the `ReplicatedResource` CustomResourceDefinition as YAML.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/replicatedresource.yaml
//!
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use kube::core::CustomResourceExt;
use resource_replication_controller::crd::ReplicatedResource;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&ReplicatedResource::crd())?);
    Ok(())
}
