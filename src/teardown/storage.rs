//! Storage release coordinator
//!
//! Issues one RELEASE storage request per storage object (preceded by DETACH
//! when attached), waits for the control plane to finish them, then removes
//! whatever storage objects the requests failed to release.

use std::time::Duration;

use serde_json::json;
use tracing::{info, warn};

use super::clock::Clock;
use super::guard::guarded_update;
use super::report::StorageSummary;
use super::requests::active_filter;
use super::TeardownError;
use crate::client::{Filter, Patch, ResourceClient};
use crate::model::values::{FORCE_DETACH_TAG, UNPROVISIONED, UNPROVISIONING};
use crate::model::{
    NewStorageRequest, ResourceKind, Storage, StorageOperation, StorageRequest, StorageState,
};

/// Default deadline for RELEASE storage requests
pub const RELEASE_TIMEOUT_SECS: u64 = 3 * 60;

/// Default interval between storage request polls
pub const POLL_INTERVAL_SECS: u64 = 30;

/// Default delay before the first poll; typically saves one pass
pub const SETTLE_DELAY_SECS: u64 = 6;

/// Longest accepted release timeout (one day)
pub const MAX_RELEASE_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Longest accepted poll interval
pub const MAX_POLL_INTERVAL_SECS: u64 = 60 * 60;

/// Timing of the release poll loop
#[derive(Debug, Clone)]
pub struct ReleaseConfig {
    /// Deadline given to each storage request, and the overall wait budget
    pub release_timeout: Duration,

    /// Sleep between polls
    pub poll_interval: Duration,

    /// Sleep before the first poll
    pub settle_delay: Duration,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            release_timeout: Duration::from_secs(RELEASE_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(POLL_INTERVAL_SECS),
            settle_delay: Duration::from_secs(SETTLE_DELAY_SECS),
        }
    }
}

impl ReleaseConfig {
    pub fn with_release_timeout(mut self, timeout: Duration) -> Self {
        self.release_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Sleep between polls; a zero interval polls once a second
    pub fn effective_poll_interval(&self) -> Duration {
        if self.poll_interval.is_zero() {
            Duration::from_secs(1)
        } else {
            self.poll_interval
        }
    }

    /// Number of polls before giving up
    pub fn attempt_budget(&self) -> u64 {
        let poll_ms = self.effective_poll_interval().as_millis();
        (self.release_timeout.as_millis() / poll_ms) as u64 + 1
    }

    /// Deadline stamped on release requests issued at `now`
    pub fn deadline(
        &self,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<chrono::DateTime<chrono::Utc>, TeardownError> {
        chrono::Duration::from_std(self.release_timeout)
            .ok()
            .and_then(|timeout| now.checked_add_signed(timeout))
            .ok_or(TeardownError::InvalidReleaseTimeout(self.release_timeout))
    }
}

/// Operations and system tags for releasing one storage object
pub fn release_plan(state: &StorageState) -> (Vec<StorageOperation>, Vec<String>) {
    match state.attached_node() {
        Some(node) => (
            vec![StorageOperation::Detach, StorageOperation::Release],
            vec![format!("{}:{}", FORCE_DETACH_TAG, node)],
        ),
        None => (vec![StorageOperation::Release], Vec::new()),
    }
}

/// Release every storage object in the cluster and remove the leftovers
pub async fn release_storage(
    client: &ResourceClient,
    clock: &dyn Clock,
    config: &ReleaseConfig,
    cluster_id: &str,
) -> Result<StorageSummary, TeardownError> {
    let mut summary = StorageSummary {
        requests: issue_release_requests(client, clock, config, cluster_id).await?,
        ..Default::default()
    };

    if summary.requests > 0 {
        wait_for_release(client, clock, config, cluster_id, summary.requests).await?;
    }

    reconcile_storage(client, cluster_id, &mut summary).await?;
    Ok(summary)
}

async fn issue_release_requests(
    client: &ResourceClient,
    clock: &dyn Clock,
    config: &ReleaseConfig,
    cluster_id: &str,
) -> Result<usize, TeardownError> {
    let deadline = config.deadline(clock.now())?;
    let storage: Vec<Storage> = client.list(&Filter::cluster(cluster_id)).await?;

    for obj in &storage {
        let (ops, system_tags) = release_plan(&obj.storage_state);
        let request = NewStorageRequest {
            complete_by_time: deadline,
            storage_id: obj.meta.id.clone(),
            requested_operations: ops,
            system_tags,
        };
        let created: StorageRequest = client.create(&request).await?;
        info!(
            "Issued storage-request[{}] {:?} for storage[{}]",
            created.meta.id, created.requested_operations, obj.meta.id
        );
    }
    Ok(storage.len())
}

/// Poll until no storage request of the cluster is active, or the budget runs out
///
/// Running out of budget is fatal only when every issued request is still
/// active; a partial release proceeds to reconciliation.
async fn wait_for_release(
    client: &ResourceClient,
    clock: &dyn Clock,
    config: &ReleaseConfig,
    cluster_id: &str,
    issued: usize,
) -> Result<(), TeardownError> {
    info!("Waiting for {} storage-requests to RELEASE storage", issued);
    let filter = active_filter(cluster_id);
    let mut attempts = config.attempt_budget();

    clock.sleep(config.settle_delay).await;
    loop {
        clock.sleep(config.effective_poll_interval()).await;
        let remaining = client.list::<StorageRequest>(&filter).await?.len();
        attempts -= 1;
        if remaining == 0 {
            return Ok(());
        }
        if attempts == 0 {
            if remaining >= issued {
                return Err(TeardownError::ReleaseTimeout { remaining });
            }
            warn!(
                "{} of {} storage-requests still active after the release timeout, continuing",
                remaining, issued
            );
            return Ok(());
        }
        info!(
            "Still waiting for {} storage-requests to RELEASE storage",
            remaining
        );
    }
}

/// Mark and delete storage objects whose release failed
async fn reconcile_storage(
    client: &ResourceClient,
    cluster_id: &str,
    summary: &mut StorageSummary,
) -> Result<(), TeardownError> {
    let leftover: Vec<Storage> = client.list(&Filter::cluster(cluster_id)).await?;
    if !leftover.is_empty() {
        warn!(
            "WARNING! {} storage-requests failed, manual CSP volume cleanup required",
            leftover.len()
        );
    }

    for obj in &leftover {
        let sid = obj.external_id().map(String::from);
        let mut state = obj.storage_state.clone();
        state.provisioned_state = if sid.is_some() {
            UNPROVISIONING
        } else {
            UNPROVISIONED
        }
        .to_string();

        let patch = Patch::new().set("storageState", json!(state));
        guarded_update(client, obj, &patch).await?;
        client.delete(ResourceKind::Storage, &obj.meta.id).await?;
        info!("Deleted storage[{}]", obj.meta.id);
        summary.leftover += 1;

        if let Some(sid) = sid {
            warn!("CSP Volume requiring manual detach and delete: {}", sid);
            summary.manual_cleanup.push(sid);
        }
    }
    Ok(())
}
