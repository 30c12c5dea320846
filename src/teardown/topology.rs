//! Allocation and topology remover
//!
//! Pools, service plan allocations and nodes go last, once no storage or
//! volume refers to them.

use serde_json::json;
use tracing::{debug, info};

use super::guard::guarded_update;
use super::report::TopologySummary;
use super::TeardownError;
use crate::client::{ApiOutcome, Filter, Patch, ResourceClient};
use crate::model::{Node, Pool, ResourceKind, ServicePlanAllocation};

/// Drop every capacity reservation held by the cluster's pools
pub async fn clear_pool_reservations(
    client: &ResourceClient,
    cluster_id: &str,
) -> Result<usize, TeardownError> {
    let pools: Vec<Pool> = client.list(&Filter::cluster(cluster_id)).await?;
    for pool in &pools {
        let patch = Patch::new().set("servicePlanReservations", json!({}));
        guarded_update(client, pool, &patch).await?;
        debug!("Cleared reservations of pool[{}]", pool.meta.id);
    }
    Ok(pools.len())
}

/// Remove `account_id` from the authorized accounts of a service plan
///
/// The control plane answers 400 while the account still has allocations
/// from the plan elsewhere; the account then stays authorized.
pub async fn deauthorize_plan_account(
    client: &ResourceClient,
    plan_id: &str,
    account_id: &str,
) -> Result<bool, TeardownError> {
    let patch = Patch::new().remove("accounts", vec![json!(account_id)]);
    match client.modify(ResourceKind::ServicePlan, plan_id, &patch).await {
        Ok(_) => Ok(true),
        Err(err) if err.outcome() == ApiOutcome::InvalidUpdate => {
            debug!(
                "Account {} still in use by service-plan[{}]: {}",
                account_id, plan_id, err
            );
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

/// Delete the cluster's service plan allocations, optionally deauthorizing
/// the owning accounts from the plans
pub async fn delete_service_plan_allocations(
    client: &ResourceClient,
    cluster_id: &str,
    deauthorize: bool,
) -> Result<usize, TeardownError> {
    let spas: Vec<ServicePlanAllocation> = client.list(&Filter::cluster(cluster_id)).await?;
    for spa in &spas {
        client
            .delete(ResourceKind::ServicePlanAllocation, &spa.meta.id)
            .await?;
        if deauthorize {
            deauthorize_plan_account(client, &spa.service_plan_id, &spa.authorized_account_id)
                .await?;
        }
    }
    info!(
        "Deleted {} service plan allocation {} associated with the cluster",
        spas.len(),
        objects(spas.len())
    );
    Ok(spas.len())
}

pub async fn delete_pools(client: &ResourceClient, cluster_id: &str) -> Result<usize, TeardownError> {
    let pools: Vec<Pool> = client.list(&Filter::cluster(cluster_id)).await?;
    for pool in &pools {
        client.delete(ResourceKind::Pool, &pool.meta.id).await?;
    }
    info!(
        "Deleted {} pool {} associated with the cluster",
        pools.len(),
        objects(pools.len())
    );
    Ok(pools.len())
}

pub async fn delete_nodes(client: &ResourceClient, cluster_id: &str) -> Result<usize, TeardownError> {
    let nodes: Vec<Node> = client.list(&Filter::cluster(cluster_id)).await?;
    for node in &nodes {
        client.delete(ResourceKind::Node, &node.meta.id).await?;
    }
    info!(
        "Deleted {} node {} associated with the cluster",
        nodes.len(),
        objects(nodes.len())
    );
    Ok(nodes.len())
}

/// Allocations, then pools, then nodes
pub async fn remove_topology(
    client: &ResourceClient,
    cluster_id: &str,
    deauthorize: bool,
) -> Result<TopologySummary, TeardownError> {
    Ok(TopologySummary {
        service_plan_allocations: delete_service_plan_allocations(client, cluster_id, deauthorize)
            .await?,
        pools: delete_pools(client, cluster_id).await?,
        nodes: delete_nodes(client, cluster_id).await?,
        ..Default::default()
    })
}

/// "object" or "objects" to follow a count
pub fn objects(count: usize) -> &'static str {
    if count == 1 {
        "object"
    } else {
        "objects"
    }
}
