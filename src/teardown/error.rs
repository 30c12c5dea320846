use thiserror::Error;

use super::orchestrator::Stage;
use crate::client::ApiError;
use crate::model::{ClusterState, ResourceKind};

/// Errors that stop a teardown
#[derive(Error, Debug)]
pub enum TeardownError {
    #[error("Cluster {name} in {state} state cannot be deleted")]
    NotEligible { name: String, state: ClusterState },

    #[error("Deletion of cluster {0} was not confirmed")]
    NotConfirmed(String),

    #[error("Cluster [{0}] not found")]
    ClusterNotFound(String),

    #[error(
        "{} for this cluster; fail them to proceed (unsafe)",
        active_totals(*storage_requests, *volume_series_requests)
    )]
    ActiveRequests {
        storage_requests: usize,
        volume_series_requests: usize,
    },

    #[error("{kind}[{id}] was modified concurrently (expected version {version}): {detail}")]
    VersionConflict {
        kind: ResourceKind,
        id: String,
        version: u64,
        detail: String,
    },

    #[error("Aborting! {remaining} storage-requests have still not completed")]
    ReleaseTimeout { remaining: usize },

    #[error("Release timeout of {}s is out of range", .0.as_secs())]
    InvalidReleaseTimeout(std::time::Duration),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: Stage,
        source: Box<TeardownError>,
    },
}

impl TeardownError {
    /// The stage that failed, for errors raised inside the stage sequence
    pub fn stage(&self) -> Option<Stage> {
        match self {
            TeardownError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The error without its stage wrapper
    pub fn cause(&self) -> &TeardownError {
        match self {
            TeardownError::Stage { source, .. } => source.cause(),
            other => other,
        }
    }

    /// Precondition failures happen before any resource is touched
    pub fn is_precondition(&self) -> bool {
        matches!(
            self.cause(),
            TeardownError::NotEligible { .. }
                | TeardownError::NotConfirmed(_)
                | TeardownError::ClusterNotFound(_)
        )
    }
}

fn active_totals(storage_requests: usize, volume_series_requests: usize) -> String {
    let mut totals = Vec::new();
    if storage_requests > 0 {
        totals.push(format!("{} active storage-requests", storage_requests));
    }
    if volume_series_requests > 0 {
        totals.push(format!(
            "{} active volume-series-requests",
            volume_series_requests
        ));
    }
    totals.join(" and ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_requests_message() {
        let err = TeardownError::ActiveRequests {
            storage_requests: 3,
            volume_series_requests: 0,
        };
        assert!(err
            .to_string()
            .starts_with("3 active storage-requests for this cluster"));

        let err = TeardownError::ActiveRequests {
            storage_requests: 1,
            volume_series_requests: 2,
        };
        assert!(err
            .to_string()
            .contains("1 active storage-requests and 2 active volume-series-requests"));
    }

    #[test]
    fn test_stage_wrapper() {
        let err = TeardownError::Stage {
            stage: Stage::ReleaseStorage,
            source: Box::new(TeardownError::ReleaseTimeout { remaining: 2 }),
        };
        assert_eq!(err.stage(), Some(Stage::ReleaseStorage));
        assert!(matches!(
            err.cause(),
            TeardownError::ReleaseTimeout { remaining: 2 }
        ));
        assert!(err.to_string().contains("release-storage"));
        assert!(err.to_string().contains("2 storage-requests"));
        assert!(!err.is_precondition());
    }

    #[test]
    fn test_precondition_classification() {
        let err = TeardownError::NotEligible {
            name: "c".to_string(),
            state: ClusterState::Managed,
        };
        assert!(err.is_precondition());
        assert_eq!(err.to_string(), "Cluster c in MANAGED state cannot be deleted");
    }
}
