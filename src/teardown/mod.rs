//! # Cluster teardown
//!
//! Removes a cluster and everything that depends on it, one stage at a time:
//!
//! 1. move the cluster to TEAR_DOWN
//! 2. resolve active storage and volume series requests
//! 3. delete or unbind bound volumes
//! 4. release storage and clear pool reservations
//! 5. delete allocations, pools and nodes
//! 6. delete the cluster
//!
//! Every write to an existing object is version guarded and a conflict stops
//! the run. Re-running after a failure continues where the last run stopped.

pub mod clock;
pub mod error;
pub mod guard;
pub mod orchestrator;
pub mod report;
pub mod requests;
pub mod storage;
pub mod topology;
pub mod volumes;

pub use clock::{Clock, SystemClock};
pub use error::TeardownError;
pub use guard::guarded_update;
pub use orchestrator::{
    locate_cluster, ClusterSelector, Orchestrator, Stage, TeardownOptions, TeardownState,
};
pub use report::{
    RequestSummary, StorageSummary, TeardownReport, TopologySummary, VolumeMode, VolumeSummary,
};
pub use storage::ReleaseConfig;
pub use topology::objects;
