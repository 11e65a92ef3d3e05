//! In-process provider for dry runs and tests
//!
//! Resources live in an ordered map keyed by lower-cased ARM id. Mutations
//! complete synchronously with `provisioningState: Succeeded`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{Completed, LongRunningOperation, NetAppProvider, Pager, ProviderError, ResourcePath};

/// One request the provider received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCall {
    pub method: &'static str,
    pub target: String,
    /// Request body as sent, for PUT, PATCH and POST
    pub body: Option<Value>,
}

#[derive(Default)]
struct State {
    resources: BTreeMap<String, Value>,
    calls: Vec<ProviderCall>,
}

#[derive(Clone)]
pub struct InMemoryProvider {
    state: Arc<Mutex<State>>,
    page_size: usize,
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            page_size: 50,
        }
    }

    /// Split list results into pages of `n` items
    pub fn with_page_size(mut self, n: usize) -> Self {
        self.page_size = n.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves the map consistent
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a resource without recording a call
    pub fn seed(&self, path: &ResourcePath, body: Value) -> Value {
        let resource = materialize(path, &body);
        self.lock().resources.insert(key(path), resource.clone());
        resource
    }

    pub fn resource(&self, path: &ResourcePath) -> Option<Value> {
        self.lock().resources.get(&key(path)).cloned()
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    fn record(state: &mut State, method: &'static str, target: String, body: Option<&Value>) {
        state.calls.push(ProviderCall {
            method,
            target,
            body: body.cloned(),
        });
    }
}

fn key(path: &ResourcePath) -> String {
    path.arm_id().to_ascii_lowercase()
}

fn parent_exists(state: &State, path: &ResourcePath) -> bool {
    path.parent()
        .map_or(true, |parent| state.resources.contains_key(&key(&parent)))
}

fn parent_missing(path: &ResourcePath) -> ProviderError {
    let parent = path.parent().map(|p| p.arm_id()).unwrap_or_default();
    ProviderError::Http {
        status: 404,
        code: "ParentResourceNotFound".to_string(),
        message: format!("Parent resource '{parent}' was not found."),
    }
}

fn merge_value(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(target), Value::Object(incoming)) => {
            for (k, v) in incoming {
                let nested = v.is_object() && target.get(k).is_some_and(Value::is_object);
                match target.get_mut(k) {
                    Some(existing) if nested => merge_value(existing, v),
                    _ => {
                        target.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (target, incoming) => *target = incoming.clone(),
    }
}

/// Build the stored form of a resource from a PUT body
fn materialize(path: &ResourcePath, body: &Value) -> Value {
    let mut properties = body
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    properties.insert("provisioningState".into(), json!("Succeeded"));

    let mut resource = Map::new();
    resource.insert("id".into(), json!(path.arm_id()));
    resource.insert("name".into(), json!(path.resource_name()));
    resource.insert("type".into(), json!(path.resource_type()));
    for field in ["location", "tags"] {
        if let Some(v) = body.get(field) {
            resource.insert(field.into(), v.clone());
        }
    }
    resource.insert("properties".into(), Value::Object(properties));
    Value::Object(resource)
}

/// Apply a PATCH body: `properties` and `tags` are merged recursively,
/// nested objects included
fn merge(existing: &mut Value, patch: &Value) {
    for section in ["properties", "tags"] {
        let Some(incoming) = patch.get(section).filter(|v| v.is_object()) else {
            continue;
        };
        if let Some(target) = existing
            .as_object_mut()
            .map(|o| o.entry(section).or_insert_with(|| json!({})))
        {
            merge_value(target, incoming);
        }
    }
    if let Some(properties) = existing.get_mut("properties").and_then(Value::as_object_mut) {
        properties.insert("provisioningState".into(), json!("Succeeded"));
    }
}

struct MemoryPager {
    state: Arc<Mutex<State>>,
    collection: ResourcePath,
    page_size: usize,
    pending: Option<Vec<Value>>,
    started: bool,
}

impl MemoryPager {
    fn snapshot(&self) -> Result<Vec<Value>, ProviderError> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        InMemoryProvider::record(&mut state, "LIST", self.collection.arm_id(), None);
        if !parent_exists(&state, &self.collection) {
            return Err(parent_missing(&self.collection));
        }
        let prefix = format!("{}/", key(&self.collection));
        Ok(state
            .resources
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| !k[prefix.len()..].contains('/'))
            .map(|(_, v)| v.clone())
            .collect())
    }
}

#[async_trait]
impl Pager for MemoryPager {
    async fn next_page(&mut self) -> Result<Option<Vec<Value>>, ProviderError> {
        if !self.started {
            self.started = true;
            self.pending = Some(self.snapshot()?);
            let first: Vec<Value> = match self.pending.as_mut() {
                Some(items) => items.drain(..items.len().min(self.page_size)).collect(),
                None => Vec::new(),
            };
            return Ok(Some(first));
        }
        match self.pending.as_mut() {
            Some(items) if !items.is_empty() => {
                Ok(Some(items.drain(..items.len().min(self.page_size)).collect()))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl NetAppProvider for InMemoryProvider {
    async fn get(&self, resource: &ResourcePath) -> Result<Value, ProviderError> {
        let mut state = self.lock();
        Self::record(&mut state, "GET", resource.arm_id(), None);
        state
            .resources
            .get(&key(resource))
            .cloned()
            .ok_or_else(|| ProviderError::not_found(&resource.arm_id()))
    }

    fn list(&self, collection: &ResourcePath) -> Box<dyn Pager> {
        Box::new(MemoryPager {
            state: Arc::clone(&self.state),
            collection: collection.clone(),
            page_size: self.page_size,
            pending: None,
            started: false,
        })
    }

    async fn begin_create_or_update(
        &self,
        resource: &ResourcePath,
        body: Value,
    ) -> Result<Box<dyn LongRunningOperation>, ProviderError> {
        let mut state = self.lock();
        Self::record(&mut state, "PUT", resource.arm_id(), Some(&body));
        if !parent_exists(&state, resource) {
            return Err(parent_missing(resource));
        }
        let stored = materialize(resource, &body);
        state.resources.insert(key(resource), stored.clone());
        Ok(Box::new(Completed(Some(stored))))
    }

    async fn begin_update(
        &self,
        resource: &ResourcePath,
        body: Value,
    ) -> Result<Box<dyn LongRunningOperation>, ProviderError> {
        let mut state = self.lock();
        Self::record(&mut state, "PATCH", resource.arm_id(), Some(&body));
        let existing = state
            .resources
            .get_mut(&key(resource))
            .ok_or_else(|| ProviderError::not_found(&resource.arm_id()))?;
        merge(existing, &body);
        Ok(Box::new(Completed(Some(existing.clone()))))
    }

    async fn begin_delete(
        &self,
        resource: &ResourcePath,
    ) -> Result<Box<dyn LongRunningOperation>, ProviderError> {
        let mut state = self.lock();
        Self::record(&mut state, "DELETE", resource.arm_id(), None);
        let k = key(resource);
        if state.resources.remove(&k).is_none() {
            return Err(ProviderError::not_found(&resource.arm_id()));
        }
        let prefix = format!("{k}/");
        state.resources.retain(|id, _| !id.starts_with(&prefix));
        Ok(Box::new(Completed(None)))
    }

    async fn begin_action(
        &self,
        resource: &ResourcePath,
        action: &str,
        body: Option<Value>,
    ) -> Result<Box<dyn LongRunningOperation>, ProviderError> {
        let mut state = self.lock();
        Self::record(
            &mut state,
            "POST",
            format!("{}/{action}", resource.arm_id()),
            body.as_ref(),
        );
        let existing = state
            .resources
            .get(&key(resource))
            .cloned()
            .ok_or_else(|| ProviderError::not_found(&resource.arm_id()))?;
        Ok(Box::new(Completed(Some(existing))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::collect_all;

    fn account() -> ResourcePath {
        ResourcePath::new("sub", "rg1").child("netAppAccounts", "acct1")
    }

    fn pool(name: &str) -> ResourcePath {
        account().child("capacityPools", name)
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let p = InMemoryProvider::new();
        let mut op = p
            .begin_create_or_update(&account(), json!({"location": "eastus", "properties": {}}))
            .await
            .unwrap();
        let created = op.poll_until_done().await.unwrap().unwrap();
        assert_eq!(created["name"], "acct1");
        assert_eq!(created["type"], "Microsoft.NetApp/netAppAccounts");
        assert_eq!(created["properties"]["provisioningState"], "Succeeded");

        let fetched = p.get(&account()).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(p.call_count(), 2);
    }

    #[tokio::test]
    async fn test_create_under_missing_parent_fails() {
        let p = InMemoryProvider::new();
        let err = p
            .begin_create_or_update(&pool("pool1"), json!({"properties": {}}))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::Http { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_ids_are_case_insensitive() {
        let p = InMemoryProvider::new();
        p.seed(&account(), json!({"location": "eastus"}));
        let upper = ResourcePath::new("SUB", "RG1").child("netAppAccounts", "ACCT1");
        assert!(p.get(&upper).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_returns_direct_children_in_pages() {
        let p = InMemoryProvider::new().with_page_size(2);
        p.seed(&account(), json!({}));
        for name in ["pool1", "pool2", "pool3"] {
            p.seed(&pool(name), json!({"properties": {"size": 4398046511104_i64}}));
        }
        p.seed(&pool("pool1").child("volumes", "vol1"), json!({}));

        let mut pager = p.list(&account().collection("capacityPools"));
        assert_eq!(p.call_count(), 0);
        assert_eq!(pager.next_page().await.unwrap().unwrap().len(), 2);
        assert_eq!(pager.next_page().await.unwrap().unwrap().len(), 1);
        assert!(pager.next_page().await.unwrap().is_none());

        let all = collect_all(p.list(&account().collection("capacityPools"))).await.unwrap();
        let names: Vec<_> = all.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["acct1/pool1", "acct1/pool2", "acct1/pool3"]);
    }

    #[tokio::test]
    async fn test_list_empty_collection() {
        let p = InMemoryProvider::new();
        let items = collect_all(p.list(&ResourcePath::new("sub", "rg1").collection("netAppAccounts")))
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_patch_merges_properties() {
        let p = InMemoryProvider::new();
        p.seed(&account(), json!({}));
        p.seed(&pool("pool1"), json!({"properties": {"serviceLevel": "Premium", "size": 1}}));
        let mut op = p
            .begin_update(&pool("pool1"), json!({"properties": {"size": 2}}))
            .await
            .unwrap();
        let updated = op.poll_until_done().await.unwrap().unwrap();
        assert_eq!(updated["properties"]["serviceLevel"], "Premium");
        assert_eq!(updated["properties"]["size"], 2);
    }

    #[tokio::test]
    async fn test_patch_merges_nested_objects_and_records_body() {
        let p = InMemoryProvider::new();
        p.seed(&account(), json!({}));
        p.seed(
            &pool("pool1"),
            json!({"properties": {"schedule": {"keep": 7, "hour": 5}}}),
        );
        let patch = json!({"properties": {"schedule": {"keep": 9}}});
        let mut op = p.begin_update(&pool("pool1"), patch.clone()).await.unwrap();
        let updated = op.poll_until_done().await.unwrap().unwrap();
        assert_eq!(updated["properties"]["schedule"], json!({"keep": 9, "hour": 5}));
        assert_eq!(p.calls().last().unwrap().body, Some(patch));
    }

    #[tokio::test]
    async fn test_delete_removes_descendants() {
        let p = InMemoryProvider::new();
        p.seed(&account(), json!({}));
        p.seed(&pool("pool1"), json!({}));
        let mut op = p.begin_delete(&account()).await.unwrap();
        assert_eq!(op.poll_until_done().await.unwrap(), None);
        assert!(p.resource(&pool("pool1")).is_none());

        let err = p.begin_delete(&account()).await.err().unwrap();
        assert_eq!(err, ProviderError::not_found(&account().arm_id()));
    }

    #[tokio::test]
    async fn test_action_records_target() {
        let p = InMemoryProvider::new();
        p.seed(&account(), json!({}));
        p.begin_action(&account(), "renewCredentials", None).await.unwrap();
        assert_eq!(
            p.calls().last().unwrap().target,
            format!("{}/renewCredentials", account().arm_id())
        );
    }
}
