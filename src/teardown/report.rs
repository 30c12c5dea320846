//! Per-stage outcome counts

use serde::Serialize;

use super::orchestrator::TeardownState;

/// What the active-request resolver did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestSummary {
    pub failed_storage_requests: usize,
    pub canceled_volume_series_requests: usize,
}

/// How bound volumes were resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeMode {
    Delete,
    #[default]
    Unbind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VolumeSummary {
    pub mode: VolumeMode,
    /// Volumes deleted or unbound, depending on the mode
    pub volumes: usize,
    pub snapshots: usize,
    pub consistency_groups: usize,
    pub application_groups: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageSummary {
    /// Release requests issued
    pub requests: usize,
    /// Storage objects whose release failed and were removed by hand
    pub leftover: usize,
    /// External volume identifiers needing out-of-band detach and delete
    pub manual_cleanup: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TopologySummary {
    pub pools_cleared: usize,
    pub service_plan_allocations: usize,
    pub pools: usize,
    pub nodes: usize,
}

/// Outcome of a whole teardown
#[derive(Debug, Clone, Serialize)]
pub struct TeardownReport {
    pub cluster_id: String,
    pub cluster_name: String,
    pub state: TeardownState,
    pub requests: RequestSummary,
    pub volumes: VolumeSummary,
    pub storage: StorageSummary,
    pub topology: TopologySummary,
}

impl TeardownReport {
    pub fn new(cluster_id: impl Into<String>, cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            cluster_name: cluster_name.into(),
            state: TeardownState::Start,
            requests: RequestSummary::default(),
            volumes: VolumeSummary::default(),
            storage: StorageSummary::default(),
            topology: TopologySummary::default(),
        }
    }

    pub fn needs_manual_cleanup(&self) -> bool {
        !self.storage.manual_cleanup.is_empty()
    }
}
