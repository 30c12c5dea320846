//! # Control plane resource model
//!
//! Typed views of the control plane objects touched by a cluster teardown.
//! Only the fields the teardown reads are modelled; everything else stays on
//! the server and is never written back.
//!
//! ## Dependency order
//!
//! ```text
//!                          Cluster
//!      ┌──────────┬───────────┼───────────┬──────────┐
//!      ▼          ▼           ▼           ▼          ▼
//!  VolumeSeries  Storage     Pool        SPA        Node
//!      │          │
//!      ├─ Snapshot└─ StorageRequest
//!      └─ ConsistencyGroup ── ApplicationGroup
//! ```

pub mod resources;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use resources::*;

/// Envelope shared by every control plane object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Opaque, immutable identifier
    pub id: String,

    /// Incremented by the control plane on every modification
    pub version: u64,
}

/// Collection names of the control plane REST API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Account,
    ApplicationGroup,
    Cluster,
    ConsistencyGroup,
    CspDomain,
    Node,
    Pool,
    ServicePlan,
    ServicePlanAllocation,
    Snapshot,
    Storage,
    StorageRequest,
    VolumeSeries,
    VolumeSeriesRequest,
}

impl ResourceKind {
    /// Path segment under `/api/v1`
    pub fn path(&self) -> &'static str {
        match self {
            ResourceKind::Account => "accounts",
            ResourceKind::ApplicationGroup => "application-groups",
            ResourceKind::Cluster => "clusters",
            ResourceKind::ConsistencyGroup => "consistency-groups",
            ResourceKind::CspDomain => "csp-domains",
            ResourceKind::Node => "nodes",
            ResourceKind::Pool => "pools",
            ResourceKind::ServicePlan => "service-plans",
            ResourceKind::ServicePlanAllocation => "service-plan-allocations",
            ResourceKind::Snapshot => "snapshots",
            ResourceKind::Storage => "storage",
            ResourceKind::StorageRequest => "storage-requests",
            ResourceKind::VolumeSeries => "volume-series",
            ResourceKind::VolumeSeriesRequest => "volume-series-requests",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// A typed control plane object
pub trait Resource: DeserializeOwned + Send {
    /// The collection this type lives in
    const KIND: ResourceKind;

    fn meta(&self) -> &Meta;

    fn id(&self) -> &str {
        &self.meta().id
    }

    fn version(&self) -> u64 {
        self.meta().version
    }
}

macro_rules! impl_resource {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Resource for $ty {
                const KIND: ResourceKind = ResourceKind::$kind;

                fn meta(&self) -> &Meta {
                    &self.meta
                }
            }
        )*
    };
}

impl_resource! {
    Account => Account,
    ApplicationGroup => ApplicationGroup,
    Cluster => Cluster,
    ConsistencyGroup => ConsistencyGroup,
    CspDomain => CspDomain,
    Node => Node,
    Pool => Pool,
    ServicePlanAllocation => ServicePlanAllocation,
    Snapshot => Snapshot,
    Storage => Storage,
    StorageRequest => StorageRequest,
    VolumeSeries => VolumeSeries,
    VolumeSeriesRequest => VolumeSeriesRequest,
}
