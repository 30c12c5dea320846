//! Teardown orchestrator
//!
//! Drives a cluster through a fixed stage sequence:
//!
//! ```text
//! START -> TEARDOWN_PENDING -> REQUESTS_RESOLVED -> VOLUMES_RESOLVED
//!       -> STORAGE_RELEASED -> TOPOLOGY_CLEARED -> DELETED
//! ```
//!
//! Nothing is rolled back. A failed run leaves the cluster in TEAR_DOWN and
//! running again picks up from whatever is left.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use super::clock::{Clock, SystemClock};
use super::guard::guarded_update;
use super::report::{TeardownReport, VolumeMode};
use super::requests::resolve_active_requests;
use super::storage::{release_storage, ReleaseConfig};
use super::topology::{clear_pool_reservations, remove_topology};
use super::volumes::remove_volumes;
use super::TeardownError;
use crate::client::{ApiError, Filter, Patch, ResourceClient};
use crate::model::{Account, Cluster, ClusterState, CspDomain, ResourceKind};

/// Progress of a teardown; each state is reached when its stage completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeardownState {
    Start,
    TeardownPending,
    RequestsResolved,
    VolumesResolved,
    StorageReleased,
    TopologyCleared,
    Deleted,
}

impl fmt::Display for TeardownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TeardownState::Start => "START",
            TeardownState::TeardownPending => "TEARDOWN_PENDING",
            TeardownState::RequestsResolved => "REQUESTS_RESOLVED",
            TeardownState::VolumesResolved => "VOLUMES_RESOLVED",
            TeardownState::StorageReleased => "STORAGE_RELEASED",
            TeardownState::TopologyCleared => "TOPOLOGY_CLEARED",
            TeardownState::Deleted => "DELETED",
        };
        f.write_str(s)
    }
}

/// One step of the teardown sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    StartTeardown,
    ResolveRequests,
    ResolveVolumes,
    ReleaseStorage,
    ClearTopology,
    DeleteCluster,
}

impl Stage {
    /// State reached once this stage completes
    pub fn reaches(&self) -> TeardownState {
        match self {
            Stage::StartTeardown => TeardownState::TeardownPending,
            Stage::ResolveRequests => TeardownState::RequestsResolved,
            Stage::ResolveVolumes => TeardownState::VolumesResolved,
            Stage::ReleaseStorage => TeardownState::StorageReleased,
            Stage::ClearTopology => TeardownState::TopologyCleared,
            Stage::DeleteCluster => TeardownState::Deleted,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::StartTeardown => "start-teardown",
            Stage::ResolveRequests => "resolve-requests",
            Stage::ResolveVolumes => "resolve-volumes",
            Stage::ReleaseStorage => "release-storage",
            Stage::ClearTopology => "clear-topology",
            Stage::DeleteCluster => "delete-cluster",
        };
        f.write_str(s)
    }
}

/// Caller choices for a teardown
#[derive(Debug, Clone, Default)]
pub struct TeardownOptions {
    /// Delete bound volumes instead of unbinding them
    pub delete_volumes: bool,

    /// Force-terminate active requests instead of aborting
    pub fail_requests: bool,

    /// Remove the owning account from service plans once their allocations go
    pub deauthorize: bool,

    /// Explicit confirmation; nothing is touched without it
    pub confirmed: bool,
}

impl TeardownOptions {
    pub fn with_delete_volumes(mut self, delete: bool) -> Self {
        self.delete_volumes = delete;
        self
    }

    pub fn with_fail_requests(mut self, fail: bool) -> Self {
        self.fail_requests = fail;
        self
    }

    pub fn with_deauthorize(mut self, deauthorize: bool) -> Self {
        self.deauthorize = deauthorize;
        self
    }

    pub fn confirmed(mut self) -> Self {
        self.confirmed = true;
        self
    }

    fn volume_mode(&self) -> VolumeMode {
        if self.delete_volumes {
            VolumeMode::Delete
        } else {
            VolumeMode::Unbind
        }
    }
}

/// Names identifying the cluster to tear down
#[derive(Debug, Clone, Default)]
pub struct ClusterSelector {
    pub account: Option<String>,
    pub domain: Option<String>,
    pub cluster_name: Option<String>,
}

impl ClusterSelector {
    fn describe(&self) -> String {
        let parts: Vec<String> = [
            ("account", &self.account),
            ("domain", &self.domain),
            ("name", &self.cluster_name),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| format!("{}={}", k, v)))
        .collect();
        parts.join(", ")
    }
}

/// Find exactly one cluster matching the selector
pub async fn locate_cluster(
    client: &ResourceClient,
    selector: &ClusterSelector,
) -> Result<Cluster, TeardownError> {
    let mut filter = Filter::new();

    let account = match &selector.account {
        Some(name) => Some(client.get_one::<Account>(&Filter::new().eq("name", name)).await?),
        None => None,
    };

    if let Some(name) = &selector.domain {
        let mut dom_filter = Filter::new().eq("name", name);
        if let Some(account) = &account {
            dom_filter = dom_filter.eq("accountId", account.meta.id.as_str());
        }
        let domain: CspDomain = client.get_one(&dom_filter).await?;
        filter = filter.eq("cspDomainId", domain.meta.id);
    }
    if let Some(name) = &selector.cluster_name {
        filter = filter.eq("name", name);
    }
    if let Some(account) = &account {
        filter = filter.eq("accountId", account.meta.id.as_str());
    }

    match client.get_one::<Cluster>(&filter).await {
        Ok(cluster) => Ok(cluster),
        Err(ApiError::NotUnique { count: 0, .. }) => {
            Err(TeardownError::ClusterNotFound(selector.describe()))
        }
        Err(err) => Err(err.into()),
    }
}

/// Runs the teardown stages against one cluster
pub struct Orchestrator {
    client: ResourceClient,
    clock: Arc<dyn Clock>,
    release: ReleaseConfig,
}

impl Orchestrator {
    pub fn new(client: ResourceClient) -> Self {
        Self {
            client,
            clock: Arc::new(SystemClock),
            release: ReleaseConfig::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_release_config(mut self, release: ReleaseConfig) -> Self {
        self.release = release;
        self
    }

    pub fn client(&self) -> &ResourceClient {
        &self.client
    }

    /// Tear down the cluster with the given id
    ///
    /// A cluster that no longer exists fails with
    /// [`TeardownError::ClusterNotFound`] before anything is written.
    pub async fn run_by_id(
        &self,
        cluster_id: &str,
        opts: &TeardownOptions,
    ) -> Result<TeardownReport, TeardownError> {
        let cluster = match self.client.get_by_id::<Cluster>(cluster_id).await {
            Ok(cluster) => cluster,
            Err(ApiError::NotFound { .. }) => {
                return Err(TeardownError::ClusterNotFound(cluster_id.to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        self.run(cluster, opts).await
    }

    /// Tear down a located cluster and everything that depends on it
    pub async fn run(
        &self,
        cluster: Cluster,
        opts: &TeardownOptions,
    ) -> Result<TeardownReport, TeardownError> {
        check_preconditions(&cluster, opts)?;

        let cluster_id = cluster.meta.id.clone();
        let mut report = TeardownReport::new(&cluster_id, &cluster.name);
        info!(
            "Tearing down cluster {}[{}] in {} state",
            cluster.name, cluster_id, cluster.state
        );

        let cluster = self
            .stage(&mut report, Stage::StartTeardown, start_cluster_teardown(&self.client, cluster))
            .await?;

        let requests = self
            .stage(
                &mut report,
                Stage::ResolveRequests,
                resolve_active_requests(
                    &self.client,
                    self.clock.as_ref(),
                    &cluster_id,
                    opts.fail_requests,
                ),
            )
            .await?;
        report.requests = requests;

        let volumes = self
            .stage(
                &mut report,
                Stage::ResolveVolumes,
                remove_volumes(&self.client, &cluster_id, opts.volume_mode()),
            )
            .await?;
        report.volumes = volumes;

        let (storage, pools_cleared) = self
            .stage(&mut report, Stage::ReleaseStorage, async {
                let storage =
                    release_storage(&self.client, self.clock.as_ref(), &self.release, &cluster_id)
                        .await?;
                let pools = clear_pool_reservations(&self.client, &cluster_id).await?;
                Ok::<_, TeardownError>((storage, pools))
            })
            .await?;
        report.storage = storage;

        let mut topology = self
            .stage(
                &mut report,
                Stage::ClearTopology,
                remove_topology(&self.client, &cluster_id, opts.deauthorize),
            )
            .await?;
        topology.pools_cleared = pools_cleared;
        report.topology = topology;

        self.stage(&mut report, Stage::DeleteCluster, async {
            self.client
                .delete(ResourceKind::Cluster, &cluster.meta.id)
                .await?;
            info!("Deleted cluster object {}[{}]", cluster.name, cluster.meta.id);
            Ok::<_, TeardownError>(())
        })
        .await?;

        if report.needs_manual_cleanup() {
            warn!(
                "{} CSP volumes require manual detach and delete",
                report.storage.manual_cleanup.len()
            );
        }
        Ok(report)
    }

    /// Run one stage, tagging its failure with the stage name
    async fn stage<T>(
        &self,
        report: &mut TeardownReport,
        stage: Stage,
        work: impl Future<Output = Result<T, TeardownError>>,
    ) -> Result<T, TeardownError> {
        info!("Stage '{}' starting", stage);
        match work.await {
            Ok(value) => {
                report.state = stage.reaches();
                info!("Stage '{}' done, cluster teardown is {}", stage, report.state);
                Ok(value)
            }
            Err(err) => {
                warn!("Stage '{}' failed: {}", stage, err);
                Err(TeardownError::Stage {
                    stage,
                    source: Box::new(err),
                })
            }
        }
    }
}

/// Eligibility, then confirmation; neither touches the control plane
fn check_preconditions(cluster: &Cluster, opts: &TeardownOptions) -> Result<(), TeardownError> {
    if !cluster.state.allows_teardown() {
        return Err(TeardownError::NotEligible {
            name: cluster.name.clone(),
            state: cluster.state.clone(),
        });
    }
    if !opts.confirmed {
        return Err(TeardownError::NotConfirmed(cluster.name.clone()));
    }
    Ok(())
}

/// Move the cluster to TEAR_DOWN unless it is already there
pub async fn start_cluster_teardown(
    client: &ResourceClient,
    cluster: Cluster,
) -> Result<Cluster, TeardownError> {
    let cluster = if cluster.state == ClusterState::TearDown {
        cluster
    } else {
        let patch = Patch::new().set("state", json!(ClusterState::TearDown.as_str()));
        guarded_update(client, &cluster, &patch).await?
    };
    info!("Cluster {} transitioned to TEAR_DOWN state", cluster.name);
    Ok(cluster)
}
