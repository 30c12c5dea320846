//! Volume cascade remover
//!
//! Delete mode removes each bound volume with its snapshots, then any
//! consistency and application groups nothing references any more. Unbind mode
//! returns each volume to a reusable UNBOUND state and leaves groups alone.

use serde_json::{json, Value};
use tracing::{debug, info};

use super::guard::guarded_update;
use super::report::{VolumeMode, VolumeSummary};
use super::TeardownError;
use crate::client::{ApiError, ApiOutcome, Filter, Patch, ResourceClient};
use crate::model::values::{VS_DELETING, VS_UNBOUND};
use crate::model::{ConsistencyGroup, ResourceKind, Snapshot, VolumeSeries};

fn bound_to(cluster_id: &str) -> Filter {
    Filter::new().eq("boundClusterId", cluster_id)
}

fn empty_object() -> Value {
    json!({})
}

/// Resolve every volume bound to the cluster in the given mode
pub async fn remove_volumes(
    client: &ResourceClient,
    cluster_id: &str,
    mode: VolumeMode,
) -> Result<VolumeSummary, TeardownError> {
    match mode {
        VolumeMode::Delete => delete_volume_series(client, cluster_id).await,
        VolumeMode::Unbind => unbind_volume_series(client, cluster_id).await,
    }
}

/// Delete bound volumes, their snapshots and any groups left unreferenced
pub async fn delete_volume_series(
    client: &ResourceClient,
    cluster_id: &str,
) -> Result<VolumeSummary, TeardownError> {
    let volumes: Vec<VolumeSeries> = client.list(&bound_to(cluster_id)).await?;
    let mut summary = VolumeSummary {
        mode: VolumeMode::Delete,
        ..Default::default()
    };
    let mut cg_ids: Vec<String> = Vec::new();

    for vol in &volumes {
        let patch = Patch::new()
            .set("volumeSeriesState", VS_DELETING)
            .set("configuredNodeId", "")
            .set("rootStorageId", "")
            .set("mounts", json!([]))
            .set("storageParcels", empty_object())
            .set("capacityAllocations", empty_object());
        guarded_update(client, vol, &patch).await?;

        summary.snapshots += delete_snapshots(client, vol).await?;
        client.delete(ResourceKind::VolumeSeries, &vol.meta.id).await?;
        info!("Deleted volume-series[{}]", vol.meta.id);
        summary.volumes += 1;

        if !vol.consistency_group_id.is_empty() && !cg_ids.contains(&vol.consistency_group_id) {
            cg_ids.push(vol.consistency_group_id.clone());
        }
    }
    info!(
        "Deleted {} volume series bound to the cluster",
        summary.volumes
    );

    let mut ag_ids: Vec<String> = Vec::new();
    for id in &cg_ids {
        if let Some(ags) = delete_consistency_group(client, id).await? {
            summary.consistency_groups += 1;
            for ag in ags {
                if !ag_ids.contains(&ag) {
                    ag_ids.push(ag);
                }
            }
        }
    }
    info!(
        "Deleted {} consistency groups for the volume series",
        summary.consistency_groups
    );

    for id in &ag_ids {
        if delete_tolerant(client, ResourceKind::ApplicationGroup, id).await? {
            summary.application_groups += 1;
        }
    }
    info!(
        "Deleted {} application groups for the consistency groups",
        summary.application_groups
    );

    Ok(summary)
}

/// Delete every snapshot of a volume; returns how many were deleted
async fn delete_snapshots(
    client: &ResourceClient,
    vol: &VolumeSeries,
) -> Result<usize, TeardownError> {
    let filter = Filter::new().eq("volumeSeriesId", vol.meta.id.as_str());
    let snapshots: Vec<Snapshot> = client.list(&filter).await?;
    for snap in &snapshots {
        client.delete(ResourceKind::Snapshot, &snap.meta.id).await?;
    }
    info!(
        "Deleted {} snapshots associated with volume series[{}]",
        snapshots.len(),
        vol.meta.id
    );
    Ok(snapshots.len())
}

/// Delete a consistency group if nothing references it any more
///
/// Returns its application group ids when it was deleted.
async fn delete_consistency_group(
    client: &ResourceClient,
    id: &str,
) -> Result<Option<Vec<String>>, TeardownError> {
    let result = async {
        let cg: ConsistencyGroup = client.get_by_id(id).await?;
        client.delete(ResourceKind::ConsistencyGroup, id).await?;
        Ok::<_, ApiError>(cg.application_group_ids)
    }
    .await;

    match result {
        Ok(ags) => {
            info!("Deleted consistency-groups[{}]", id);
            Ok(Some(ags))
        }
        Err(err) => tolerate(err, ResourceKind::ConsistencyGroup, id).map(|_| None),
    }
}

/// Delete an object, treating not-found and in-use as "not deleted"
async fn delete_tolerant(
    client: &ResourceClient,
    kind: ResourceKind,
    id: &str,
) -> Result<bool, TeardownError> {
    match client.delete(kind, id).await {
        Ok(()) => {
            info!("Deleted {}[{}]", kind, id);
            Ok(true)
        }
        Err(err) => tolerate(err, kind, id).map(|_| false),
    }
}

fn tolerate(err: ApiError, kind: ResourceKind, id: &str) -> Result<(), TeardownError> {
    match err.outcome() {
        ApiOutcome::NotFound => {
            debug!("{}[{}] already gone", kind, id);
            Ok(())
        }
        ApiOutcome::Conflict => {
            debug!("{}[{}] still in use, left in place", kind, id);
            Ok(())
        }
        ApiOutcome::InvalidUpdate | ApiOutcome::OtherFailure => Err(err.into()),
    }
}

/// Return bound volumes to the UNBOUND state, keeping snapshots and groups
pub async fn unbind_volume_series(
    client: &ResourceClient,
    cluster_id: &str,
) -> Result<VolumeSummary, TeardownError> {
    let volumes: Vec<VolumeSeries> = client.list(&bound_to(cluster_id)).await?;
    let mut summary = VolumeSummary {
        mode: VolumeMode::Unbind,
        ..Default::default()
    };

    for vol in &volumes {
        let mut lifecycle = vol.lifecycle_management_data.clone();
        lifecycle.insert("finalSnapshotNeeded".to_string(), json!(false));

        let patch = Patch::new()
            .set("volumeSeriesState", VS_UNBOUND)
            .set("boundClusterId", "")
            .set("configuredNodeId", "")
            .set("rootStorageId", "")
            .set("servicePlanAllocationId", "")
            .set("clusterDescriptor", empty_object())
            .set("mounts", json!([]))
            .set("spaAdditionalBytes", 0)
            .set("storageParcels", empty_object())
            .set("cacheAllocations", empty_object())
            .set("capacityAllocations", empty_object())
            .set("systemTags", json!(vol.unbound_system_tags()))
            .set("lifecycleManagementData", Value::Object(lifecycle));
        guarded_update(client, vol, &patch).await?;
        summary.volumes += 1;
        debug!("Unbound volume-series[{}]", vol.meta.id);
    }
    info!(
        "Unbound {} volume series bound to the cluster",
        summary.volumes
    );
    Ok(summary)
}
