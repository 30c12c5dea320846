//! Active-request resolver
//!
//! Refuses to race an in-flight storage or volume-series request unless told
//! to force-terminate them. Requests created after the check are not seen.

use serde_json::json;
use tracing::info;

use super::clock::Clock;
use super::guard::guarded_update;
use super::report::RequestSummary;
use super::TeardownError;
use crate::client::{Filter, Patch, ResourceClient};
use crate::model::values::{SR_FAILED, VSR_CANCELED};
use crate::model::{RequestMessage, StorageRequest, VolumeSeriesRequest};

/// Audit text appended to force-failed storage requests
pub const FAILED_MESSAGE: &str = "FAILED by cluster teardown";

/// Audit text appended to force-canceled volume series requests
pub const CANCELED_MESSAGE: &str = "CANCELED by cluster teardown";

/// Non-terminated requests scoped to a cluster
pub fn active_filter(cluster_id: &str) -> Filter {
    Filter::cluster(cluster_id).flag("isTerminated", false)
}

/// Detect active requests for the cluster and fail them when `force_fail` is set
pub async fn resolve_active_requests(
    client: &ResourceClient,
    clock: &dyn Clock,
    cluster_id: &str,
    force_fail: bool,
) -> Result<RequestSummary, TeardownError> {
    let filter = active_filter(cluster_id);
    let srs: Vec<StorageRequest> = client.list(&filter).await?;
    let vsrs: Vec<VolumeSeriesRequest> = client.list(&filter).await?;

    if srs.is_empty() && vsrs.is_empty() {
        info!("No active requests detected for this cluster, continuing...");
        return Ok(RequestSummary::default());
    }

    if !force_fail {
        return Err(TeardownError::ActiveRequests {
            storage_requests: srs.len(),
            volume_series_requests: vsrs.len(),
        });
    }

    let now = clock.now();
    let mut summary = RequestSummary::default();

    for req in &srs {
        let mut messages = req.request_messages.clone();
        messages.push(RequestMessage {
            message: FAILED_MESSAGE.to_string(),
            time: now,
        });
        let patch = Patch::new()
            .set("storageRequestState", json!(SR_FAILED))
            .set_serialized("requestMessages", &messages)?;
        guarded_update(client, req, &patch).await?;
        summary.failed_storage_requests += 1;
        info!("Set storage request[{}] state FAILED", req.meta.id);
    }

    for req in &vsrs {
        let mut messages = req.request_messages.clone();
        messages.push(RequestMessage {
            message: CANCELED_MESSAGE.to_string(),
            time: now,
        });
        let patch = Patch::new()
            .set("volumeSeriesRequestState", json!(VSR_CANCELED))
            .set_serialized("requestMessages", &messages)?;
        guarded_update(client, req, &patch).await?;
        summary.canceled_volume_series_requests += 1;
        info!("Set volume series request[{}] state CANCELED", req.meta.id);
    }

    info!(
        "Marked {} storage-requests FAILED and {} volume-series-requests CANCELED",
        summary.failed_storage_requests, summary.canceled_volume_series_requests
    );
    Ok(summary)
}
