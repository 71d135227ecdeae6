//! # ConfigMap Payload

use super::Mirror;
use k8s_openapi::api::core::v1::ConfigMap;

impl Mirror for ConfigMap {
    fn mirror_payload(source: &Self, destination: &mut Self) {
        destination.data.clone_from(&source.data);
        destination.binary_data.clone_from(&source.binary_data);
    }
}
