//! Query filters and partial-update bodies

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use super::ApiError;

/// Field-equality query parameters for a collection listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    params: Vec<(String, String)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything scoped to a cluster via `clusterId`
    pub fn cluster(cluster_id: &str) -> Self {
        Self::new().eq("clusterId", cluster_id)
    }

    /// Add an equality match
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Add a boolean match, encoded as `true`/`false`
    pub fn flag(self, key: impl Into<String>, value: bool) -> Self {
        self.eq(key, if value { "true" } else { "false" })
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// A partial update: the body plus which of its fields are set or removed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    body: Map<String, Value>,
    set: Vec<String>,
    remove: Vec<String>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `field` with `value`
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.body.insert(field.to_string(), value.into());
        if !self.set.iter().any(|f| f == field) {
            self.set.push(field.to_string());
        }
        self
    }

    /// Replace `field` with a serialized value
    pub fn set_serialized<T: Serialize>(self, field: &str, value: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(value)
            .map_err(|e| ApiError::Parse(format!("{}: {}", field, e)))?;
        Ok(self.set(field, value))
    }

    /// Remove the listed `values` from the list-valued `field`
    pub fn remove(mut self, field: &str, values: Vec<Value>) -> Self {
        self.body.insert(field.to_string(), Value::Array(values));
        if !self.remove.iter().any(|f| f == field) {
            self.remove.push(field.to_string());
        }
        self
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    pub fn set_fields(&self) -> &[String] {
        &self.set
    }

    pub fn remove_fields(&self) -> &[String] {
        &self.remove
    }

    /// Query parameters describing this update
    pub fn query(&self, version: Option<u64>) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(v) = version {
            query.push(("version".to_string(), v.to_string()));
        }
        for f in &self.set {
            query.push(("set".to_string(), f.clone()));
        }
        for f in &self.remove {
            query.push(("remove".to_string(), f.clone()));
        }
        query
    }
}
