//! # Secret Payload
//!
//! A Secret's payload is its `data` map. The `type` is copied on create only,
//! since the API server rejects changes to it afterwards.

use super::Mirror;
use k8s_openapi::api::core::v1::Secret;

impl Mirror for Secret {
    fn mirror_payload(source: &Self, destination: &mut Self) {
        if destination.type_.is_none() {
            destination.type_.clone_from(&source.type_);
        }
        destination.data.clone_from(&source.data);
        destination.string_data = None;
    }
}
