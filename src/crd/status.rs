//! # ReplicatedResource Status
//!
//! Status types written by the reconciler after each mutating or failed attempt.

use serde::{Deserialize, Serialize};

/// Observed state of a ReplicatedResource
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplicatedResourceStatus {
    /// Outcome of the last attempt that wrote status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<ReplicationPhase>,
    /// Latest attempt only; replaced as a whole on every write
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Generation of the declaration that produced this status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum ReplicationPhase {
    Completed,
    Failed,
}

impl ReplicationPhase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicationPhase::Completed => "Completed",
            ReplicationPhase::Failed => "Failed",
        }
    }
}

/// Status of a condition (True, False, Unknown)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// Condition describing the last replication attempt
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition, always "Complete"
    pub r#type: String,
    /// True when the last attempt replicated the source
    pub status: ConditionStatus,
    /// Last time the condition was checked (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_probe_time: Option<String>,
    /// Last time the condition status changed (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
    /// Brief reason for the last transition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Human readable details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
