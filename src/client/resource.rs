//! Typed CRUD over the untyped transport

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::{ApiError, ControlPlaneApi, Filter, Patch};
use crate::model::{Resource, ResourceKind};

/// Typed resource client shared by every teardown stage
#[derive(Clone)]
pub struct ResourceClient {
    api: Arc<dyn ControlPlaneApi>,
}

impl ResourceClient {
    pub fn new(api: Arc<dyn ControlPlaneApi>) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &Arc<dyn ControlPlaneApi> {
        &self.api
    }

    /// All objects of type `R` matching the filter, in server order
    pub async fn list<R: Resource>(&self, filter: &Filter) -> Result<Vec<R>, ApiError> {
        self.api
            .list(R::KIND, filter)
            .await?
            .into_iter()
            .map(decode::<R>)
            .collect()
    }

    /// Exactly one object of type `R` matching the filter
    pub async fn get_one<R: Resource>(&self, filter: &Filter) -> Result<R, ApiError> {
        let mut objects = self.list::<R>(filter).await?;
        if objects.len() != 1 {
            return Err(ApiError::NotUnique {
                operation: format!("{}({})", R::KIND, filter),
                count: objects.len(),
            });
        }
        Ok(objects.remove(0))
    }

    pub async fn get_by_id<R: Resource>(&self, id: &str) -> Result<R, ApiError> {
        decode(self.api.get(R::KIND, id).await?)
    }

    pub async fn create<R: Resource, B: Serialize + Sync>(&self, body: &B) -> Result<R, ApiError> {
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::Parse(format!("{}: {}", R::KIND, e)))?;
        decode(self.api.create(R::KIND, body).await?)
    }

    /// Update an object, conditioned on the version last observed
    pub async fn update<R: Resource>(
        &self,
        id: &str,
        version: u64,
        patch: &Patch,
    ) -> Result<R, ApiError> {
        decode(self.api.update(R::KIND, id, Some(version), patch).await?)
    }

    /// Update an object without a version condition; the result is not decoded
    pub async fn modify(
        &self,
        kind: ResourceKind,
        id: &str,
        patch: &Patch,
    ) -> Result<Value, ApiError> {
        self.api.update(kind, id, None, patch).await
    }

    pub async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), ApiError> {
        self.api.delete(kind, id).await
    }

    pub async fn ping(&self) -> Result<(), ApiError> {
        self.api.ping().await
    }
}

fn decode<R: Resource>(value: Value) -> Result<R, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Parse(format!("{}: {}", R::KIND, e)))
}
