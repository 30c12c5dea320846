//! Version-guarded mutation
//!
//! Every write to an existing object carries the version the caller last read.
//! A conflict is never retried: another actor is changing the object, so the
//! current stage stops rather than overwrite it.

use tracing::warn;

use super::TeardownError;
use crate::client::{ApiError, ApiOutcome, Patch, ResourceClient};
use crate::model::Resource;

/// Apply `patch` to `current`, conditioned on `current`'s version
///
/// A version mismatch, or the object vanishing since it was read, becomes
/// [`TeardownError::VersionConflict`]. Other failures pass through unchanged.
pub async fn guarded_update<R: Resource>(
    client: &ResourceClient,
    current: &R,
    patch: &Patch,
) -> Result<R, TeardownError> {
    let version = current.version();
    match client.update::<R>(current.id(), version, patch).await {
        Ok(updated) => Ok(updated),
        Err(err) => match err.outcome() {
            ApiOutcome::Conflict | ApiOutcome::NotFound => {
                warn!(
                    "{}[{}] changed since version {}, aborting",
                    R::KIND,
                    current.id(),
                    version
                );
                Err(TeardownError::VersionConflict {
                    kind: R::KIND,
                    id: current.id().to_string(),
                    version,
                    detail: conflict_detail(&err),
                })
            }
            ApiOutcome::InvalidUpdate | ApiOutcome::OtherFailure => Err(err.into()),
        },
    }
}

fn conflict_detail(err: &ApiError) -> String {
    match err {
        ApiError::Conflict { body, .. } | ApiError::NotFound { body, .. } if !body.is_empty() => {
            body.clone()
        }
        other => other.to_string(),
    }
}
