pub mod api;
pub mod error;
pub mod params;
pub mod resource;

#[cfg(test)]
pub mod mock;

pub use api::{ConnectionConfig, ControlPlaneApi, HttpControlPlane, API_PREFIX};
pub use error::{ApiError, ApiOutcome};
pub use params::{Filter, Patch};
pub use resource::ResourceClient;
