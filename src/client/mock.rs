//! In-memory control plane for tests
//!
//! Mirrors the server behaviour the teardown depends on: filtered listing,
//! version-checked updates, reference-counted group deletes and storage
//! requests that release their storage object.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{ApiError, ControlPlaneApi, Filter, Patch};
use crate::model::ResourceKind;

/// Kind of call made against the mock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    List,
    Get,
    Create,
    Update,
    Delete,
}

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub method: Method,
    pub kind: ResourceKind,
    pub id: Option<String>,
}

impl Call {
    pub fn is_write(&self) -> bool {
        matches!(self.method, Method::Create | Method::Update | Method::Delete)
    }
}

/// What happens to a storage request once it is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseBehavior {
    /// The request succeeds and the storage object is removed
    Succeed,
    /// The request terminates in FAILED and the storage object stays
    Fail,
    /// The request never terminates
    Hang,
}

struct Fault {
    method: Method,
    kind: ResourceKind,
    id: Option<String>,
    status: u16,
}

struct MockState {
    objects: Vec<(ResourceKind, Value)>,
    next_id: u64,
    calls: Vec<Call>,
    faults: Vec<Fault>,
    release: ReleaseBehavior,
}

pub struct MockControlPlane {
    state: Mutex<MockState>,
}

impl Default for MockControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

fn terminal_state(kind: ResourceKind, object: &Value) -> bool {
    let field = match kind {
        ResourceKind::StorageRequest => "storageRequestState",
        ResourceKind::VolumeSeriesRequest => "volumeSeriesRequestState",
        _ => return false,
    };
    matches!(
        object[field].as_str(),
        Some("SUCCEEDED") | Some("FAILED") | Some("CANCELED")
    )
}

fn matches_filter(kind: ResourceKind, object: &Value, filter: &Filter) -> bool {
    filter.params().iter().all(|(key, expected)| {
        if key == "isTerminated" {
            return terminal_state(kind, object).to_string() == *expected;
        }
        match &object[key.as_str()] {
            Value::String(s) => s == expected,
            Value::Null => false,
            other => other.to_string() == *expected,
        }
    })
}

fn object_id(object: &Value) -> &str {
    object["meta"]["id"].as_str().unwrap_or_default()
}

impl MockControlPlane {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                objects: Vec::new(),
                next_id: 1,
                calls: Vec::new(),
                faults: Vec::new(),
                release: ReleaseBehavior::Succeed,
            }),
        }
    }

    /// Store an object, assigning `meta` when absent; returns its id
    pub fn insert(&self, kind: ResourceKind, mut object: Value) -> String {
        let mut state = self.state.lock().unwrap();
        if object.get("meta").is_none() {
            let id = format!("{}-{}", kind.path(), state.next_id);
            state.next_id += 1;
            object["meta"] = json!({"id": id, "version": 1});
        }
        let id = object_id(&object).to_string();
        state.objects.push((kind, object));
        id
    }

    pub fn get_object(&self, kind: ResourceKind, id: &str) -> Option<Value> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .iter()
            .find(|(k, o)| *k == kind && object_id(o) == id)
            .map(|(_, o)| o.clone())
    }

    pub fn exists(&self, kind: ResourceKind, id: &str) -> bool {
        self.get_object(kind, id).is_some()
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        let state = self.state.lock().unwrap();
        state.objects.iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn objects(&self, kind: ResourceKind) -> Vec<Value> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, o)| o.clone())
            .collect()
    }

    /// Simulate another actor modifying an object
    pub fn bump_version(&self, kind: ResourceKind, id: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some((_, o)) = state
            .objects
            .iter_mut()
            .find(|(k, o)| *k == kind && object_id(o) == id)
        {
            let version = o["meta"]["version"].as_u64().unwrap_or(1);
            o["meta"]["version"] = json!(version + 1);
        }
    }

    /// Fail the next matching call with `status`; `id` of `None` matches any object
    pub fn fail_on(&self, method: Method, kind: ResourceKind, id: Option<&str>, status: u16) {
        self.state.lock().unwrap().faults.push(Fault {
            method,
            kind,
            id: id.map(String::from),
            status,
        });
    }

    pub fn set_release(&self, behavior: ReleaseBehavior) {
        self.state.lock().unwrap().release = behavior;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    /// Index of the first recorded call matching, for ordering assertions
    pub fn position(&self, method: Method, kind: ResourceKind, id: &str) -> Option<usize> {
        self.calls()
            .iter()
            .position(|c| c.method == method && c.kind == kind && c.id.as_deref() == Some(id))
    }

    fn record(
        &self,
        state: &mut MockState,
        method: Method,
        kind: ResourceKind,
        id: Option<&str>,
    ) -> Result<(), ApiError> {
        state.calls.push(Call {
            method,
            kind,
            id: id.map(String::from),
        });
        let hit = state.faults.iter().position(|f| {
            f.method == method && f.kind == kind && (f.id.is_none() || f.id.as_deref() == id)
        });
        if let Some(idx) = hit {
            let fault = state.faults.remove(idx);
            return Err(ApiError::from_status(
                format!("{:?} {}", method, kind),
                fault.status,
                "injected failure",
            ));
        }
        Ok(())
    }
}

/// Whether any object still references `id` in a way the server protects
fn in_use(state: &MockState, kind: ResourceKind, id: &str) -> bool {
    state.objects.iter().any(|(k, o)| match (kind, k) {
        (ResourceKind::ConsistencyGroup, ResourceKind::VolumeSeries) => {
            o["consistencyGroupId"].as_str() == Some(id)
        }
        (ResourceKind::ApplicationGroup, ResourceKind::ConsistencyGroup) => o
            ["applicationGroupIds"]
            .as_array()
            .map(|ids| ids.iter().any(|v| v.as_str() == Some(id)))
            .unwrap_or(false),
        _ => false,
    })
}

#[async_trait]
impl ControlPlaneApi for MockControlPlane {
    async fn list(&self, kind: ResourceKind, filter: &Filter) -> Result<Vec<Value>, ApiError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, Method::List, kind, None)?;
        Ok(state
            .objects
            .iter()
            .filter(|(k, o)| *k == kind && matches_filter(kind, o, filter))
            .map(|(_, o)| o.clone())
            .collect())
    }

    async fn get(&self, kind: ResourceKind, id: &str) -> Result<Value, ApiError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, Method::Get, kind, Some(id))?;
        state
            .objects
            .iter()
            .find(|(k, o)| *k == kind && object_id(o) == id)
            .map(|(_, o)| o.clone())
            .ok_or_else(|| ApiError::from_status(format!("query {}[{}]", kind, id), 404, ""))
    }

    async fn create(&self, kind: ResourceKind, mut body: Value) -> Result<Value, ApiError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, Method::Create, kind, None)?;

        let id = format!("{}-{}", kind.path(), state.next_id);
        state.next_id += 1;
        body["meta"] = json!({"id": id, "version": 1});

        if kind == ResourceKind::StorageRequest {
            let storage_id = body["storageId"].as_str().unwrap_or_default().to_string();
            let cluster_id = state
                .objects
                .iter()
                .find(|(k, o)| *k == ResourceKind::Storage && object_id(o) == storage_id)
                .map(|(_, o)| o["clusterId"].clone())
                .unwrap_or(Value::Null);
            body["clusterId"] = cluster_id;
            let request_state = match state.release {
                ReleaseBehavior::Succeed => {
                    state.objects.retain(|(k, o)| {
                        !(*k == ResourceKind::Storage && object_id(o) == storage_id)
                    });
                    "SUCCEEDED"
                }
                ReleaseBehavior::Fail => "FAILED",
                ReleaseBehavior::Hang => "NEW",
            };
            body["storageRequestState"] = json!(request_state);
        }

        state.objects.push((kind, body.clone()));
        Ok(body)
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: &str,
        version: Option<u64>,
        patch: &Patch,
    ) -> Result<Value, ApiError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, Method::Update, kind, Some(id))?;
        let operation = format!("update {}[{}]", kind, id);

        let object = match state
            .objects
            .iter_mut()
            .find(|(k, o)| *k == kind && object_id(o) == id)
        {
            Some((_, o)) => o,
            None => return Err(ApiError::from_status(operation, 404, "")),
        };

        let current = object["meta"]["version"].as_u64().unwrap_or(1);
        if let Some(v) = version {
            if v != current {
                return Err(ApiError::from_status(operation, 409, "version mismatch"));
            }
        }

        for field in patch.set_fields() {
            object[field.as_str()] = patch.body()[field.as_str()].clone();
        }
        for field in patch.remove_fields() {
            let removed = patch.body()[field.as_str()]
                .as_array()
                .cloned()
                .unwrap_or_default();
            if let Some(list) = object[field.as_str()].as_array_mut() {
                list.retain(|v| !removed.contains(v));
            }
        }
        object["meta"]["version"] = json!(current + 1);
        Ok(object.clone())
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, Method::Delete, kind, Some(id))?;
        let operation = format!("delete {}[{}]", kind, id);

        if !state
            .objects
            .iter()
            .any(|(k, o)| *k == kind && object_id(o) == id)
        {
            return Err(ApiError::from_status(operation, 404, ""));
        }
        if in_use(&state, kind, id) {
            return Err(ApiError::from_status(operation, 409, "object in use"));
        }
        state
            .objects
            .retain(|(k, o)| !(*k == kind && object_id(o) == id));
        Ok(())
    }

    async fn ping(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

/// Empty JSON object, handy for seeding map-valued fields
pub fn empty_map() -> Value {
    Value::Object(Map::new())
}
