//! Control plane object types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Meta;

/// State and tag values written by the teardown
pub mod values {
    pub const VS_DELETING: &str = "DELETING";
    pub const VS_UNBOUND: &str = "UNBOUND";
    pub const SR_FAILED: &str = "FAILED";
    pub const VSR_CANCELED: &str = "CANCELED";
    pub const ATTACHMENT_DETACHED: &str = "DETACHED";
    pub const UNPROVISIONING: &str = "UNPROVISIONING";
    pub const UNPROVISIONED: &str = "UNPROVISIONED";

    /// System tags with this prefix are only valid while a volume is bound
    pub const CLUSTER_TAG_PREFIX: &str = "volume.cluster.";

    /// Storage request system tag naming the node to force-detach from
    pub const FORCE_DETACH_TAG: &str = "sr.forceDetachNodeID";
}

// ============================================================================
// Cluster
// ============================================================================

/// Lifecycle state of a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ClusterState {
    Deployable,
    Managed,
    TimedOut,
    Resetting,
    TearDown,
    Other(String),
}

impl ClusterState {
    /// Teardown is only permitted from these states
    pub fn allows_teardown(&self) -> bool {
        matches!(
            self,
            ClusterState::Deployable | ClusterState::TimedOut | ClusterState::TearDown
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            ClusterState::Deployable => "DEPLOYABLE",
            ClusterState::Managed => "MANAGED",
            ClusterState::TimedOut => "TIMED_OUT",
            ClusterState::Resetting => "RESETTING",
            ClusterState::TearDown => "TEAR_DOWN",
            ClusterState::Other(s) => s,
        }
    }
}

impl From<String> for ClusterState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "DEPLOYABLE" => ClusterState::Deployable,
            "MANAGED" => ClusterState::Managed,
            "TIMED_OUT" => ClusterState::TimedOut,
            "RESETTING" => ClusterState::Resetting,
            "TEAR_DOWN" => ClusterState::TearDown,
            _ => ClusterState::Other(s),
        }
    }
}

impl From<ClusterState> for String {
    fn from(state: ClusterState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub meta: Meta,
    pub name: String,
    pub state: ClusterState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub meta: Meta,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CspDomain {
    pub meta: Meta,
    pub name: String,
    #[serde(default)]
    pub account_id: String,
}

// ============================================================================
// Volumes and their groups
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSeries {
    pub meta: Meta,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bound_cluster_id: String,
    #[serde(default)]
    pub consistency_group_id: String,
    #[serde(default)]
    pub volume_series_state: String,
    #[serde(default)]
    pub system_tags: Vec<String>,

    /// Opaque to the teardown except for `finalSnapshotNeeded`
    #[serde(default)]
    pub lifecycle_management_data: Map<String, Value>,
}

impl VolumeSeries {
    /// System tags that remain valid once the volume is no longer bound
    pub fn unbound_system_tags(&self) -> Vec<String> {
        self.system_tags
            .iter()
            .filter(|t| !t.starts_with(values::CLUSTER_TAG_PREFIX))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub meta: Meta,
    pub volume_series_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyGroup {
    pub meta: Meta,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub application_group_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationGroup {
    pub meta: Meta,
    #[serde(default)]
    pub name: String,
}

// ============================================================================
// Storage
// ============================================================================

/// Operations a storage request can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageOperation {
    Provision,
    Attach,
    Format,
    Use,
    Close,
    Detach,
    Reattach,
    Release,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageState {
    #[serde(default)]
    pub attachment_state: String,
    #[serde(default)]
    pub attached_node_id: String,
    #[serde(default)]
    pub provisioned_state: String,

    /// Remaining state fields, written back untouched
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl StorageState {
    /// The node this storage must be force-detached from, if any
    pub fn attached_node(&self) -> Option<&str> {
        if self.attachment_state != values::ATTACHMENT_DETACHED && !self.attached_node_id.is_empty()
        {
            Some(&self.attached_node_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Storage {
    pub meta: Meta,
    #[serde(default)]
    pub cluster_id: String,
    #[serde(default)]
    pub storage_identifier: String,
    pub storage_state: StorageState,
}

impl Storage {
    /// Identifier of the physical backing volume, when one exists
    pub fn external_id(&self) -> Option<&str> {
        if self.storage_identifier.is_empty() {
            None
        } else {
            Some(&self.storage_identifier)
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Audit entry appended to a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMessage {
    pub message: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageRequest {
    pub meta: Meta,
    #[serde(default)]
    pub cluster_id: String,
    #[serde(default)]
    pub storage_id: String,
    #[serde(default)]
    pub requested_operations: Vec<StorageOperation>,
    #[serde(default)]
    pub storage_request_state: String,
    #[serde(default)]
    pub request_messages: Vec<RequestMessage>,
    #[serde(default)]
    pub complete_by_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub system_tags: Vec<String>,
}

/// Body of a storage request creation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStorageRequest {
    pub complete_by_time: DateTime<Utc>,
    pub storage_id: String,
    pub requested_operations: Vec<StorageOperation>,
    pub system_tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSeriesRequest {
    pub meta: Meta,
    #[serde(default)]
    pub cluster_id: String,
    #[serde(default)]
    pub volume_series_request_state: String,
    #[serde(default)]
    pub request_messages: Vec<RequestMessage>,
}

// ============================================================================
// Capacity and topology
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    pub meta: Meta,
    #[serde(default)]
    pub cluster_id: String,
    #[serde(default)]
    pub service_plan_reservations: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePlanAllocation {
    pub meta: Meta,
    #[serde(default)]
    pub cluster_id: String,
    pub service_plan_id: String,
    pub authorized_account_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub meta: Meta,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cluster_id: String,
}
