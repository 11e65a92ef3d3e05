//! Shared fixtures for the anf-tools integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anf_tools::provider::memory::InMemoryProvider;
use anf_tools::schema::{ObjectSchema, Schema};
use anf_tools::{
    AuditEvent, AuditSink, Collaborators, Defaults, HandlerError, InvocationContext, ToolHandler,
};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

pub const SUBSCRIPTION: &str = "9b3a2c0e-1d4f-4a8b-9c7d-112233445566";
pub const RESOURCE_GROUP: &str = "rg1";

/// Audit sink that keeps every event for inspection
#[derive(Default)]
pub struct RecordingAudit {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAudit {
    pub fn operations(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.operation.clone())
            .collect()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl AuditSink for RecordingAudit {
    fn record(&self, event: AuditEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Handler that remembers the arguments it was called with
#[derive(Clone, Default)]
pub struct CountingHandler {
    pub calls: Arc<Mutex<Vec<Value>>>,
}

impl CountingHandler {
    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ToolHandler for CountingHandler {
    async fn call(&self, ctx: InvocationContext<'_>) -> Result<Value, HandlerError> {
        self.calls.lock().unwrap().push(ctx.args.clone());
        Ok(json!({"success": true, "operation": ctx.tool}))
    }
}

pub struct Harness {
    pub provider: InMemoryProvider,
    pub audit: Arc<RecordingAudit>,
    pub collab: Collaborators,
}

pub fn harness(defaults: Defaults) -> Harness {
    let provider = InMemoryProvider::new();
    let audit = Arc::new(RecordingAudit::default());
    let collab = Collaborators::new(Arc::new(provider.clone()), audit.clone())
        .with_defaults(defaults)
        .with_actor("test-suite");
    Harness {
        provider,
        audit,
        collab,
    }
}

pub fn full_defaults() -> Defaults {
    Defaults {
        subscription_id: Some(SUBSCRIPTION.to_string()),
        resource_group: Some(RESOURCE_GROUP.to_string()),
        location: Some("eastus".to_string()),
    }
}

/// Candidate strings tried in order until one satisfies a string constraint
const STRING_CANDIDATES: &[&str] = &[
    "sample1",
    "00000000-0000-0000-0000-000000000000",
    "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg1/providers/Microsoft.NetApp/netAppAccounts/acct1",
    "SH1",
    "Monday",
    "1",
    "/data/file1",
];

/// A value satisfying `schema`, with every optional field filled in
pub fn sample(schema: &Schema) -> Value {
    match schema {
        Schema::String(_) => STRING_CANDIDATES
            .iter()
            .map(|s| json!(s))
            .find(|v| schema.validate(v).is_ok())
            .unwrap_or_else(|| panic!("no sample string satisfies {schema:?}")),
        Schema::Number(n) => {
            let value = n.minimum.unwrap_or(0.0);
            if n.integer {
                json!(value as i64)
            } else {
                json!(value)
            }
        }
        Schema::Boolean(_) => json!(true),
        Schema::Enum(e) => json!(e.values[0]),
        Schema::Object(o) => sample_object(o),
        Schema::Array(a) => {
            let n = a.min_items.unwrap_or(1).max(1);
            Value::Array((0..n).map(|_| sample(&a.items)).collect())
        }
    }
}

pub fn sample_object(schema: &ObjectSchema) -> Value {
    let map: Map<String, Value> = schema
        .fields
        .iter()
        .map(|f| (f.name.clone(), sample(&f.schema)))
        .collect();
    Value::Object(map)
}

/// Every object field reachable from `schema`, as JSON pointer plus required flag.
///
/// Array elements are addressed through their first item.
pub fn field_pointers(schema: &Schema, prefix: &str, out: &mut Vec<(String, bool)>) {
    match schema {
        Schema::Object(o) => {
            for f in &o.fields {
                let pointer = format!("{prefix}/{}", f.name);
                out.push((pointer.clone(), f.required));
                field_pointers(&f.schema, &pointer, out);
            }
        }
        Schema::Array(a) => field_pointers(&a.items, &format!("{prefix}/0"), out),
        _ => {}
    }
}

/// Remove the value at `pointer`; returns false when nothing was there
pub fn remove_at(value: &mut Value, pointer: &str) -> bool {
    let Some((parent, key)) = pointer.rsplit_once('/') else {
        return false;
    };
    match value.pointer_mut(parent) {
        Some(Value::Object(map)) => map.remove(key).is_some(),
        _ => false,
    }
}

/// Every enum node reachable from `schema`, as JSON pointer plus accepted values
pub fn enum_pointers(schema: &Schema, prefix: &str, out: &mut Vec<(String, Vec<&'static str>)>) {
    match schema {
        Schema::Enum(e) => out.push((prefix.to_string(), e.values.clone())),
        Schema::Object(o) => {
            for f in &o.fields {
                enum_pointers(&f.schema, &format!("{prefix}/{}", f.name), out);
            }
        }
        Schema::Array(a) => enum_pointers(&a.items, &format!("{prefix}/0"), out),
        _ => {}
    }
}
