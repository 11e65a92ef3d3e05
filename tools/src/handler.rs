//! Generic resource handler
//!
//! One [`ResourceHandler`] serves every CRUD-style tool: it resolves the ARM
//! path from the validated arguments, calls the provider, drives any
//! long-running operation to a terminal state and shapes the result.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::context::{HandlerError, InvocationContext, ToolHandler};
use crate::provider::{collect_all, provisioning_state, ResourcePath};
use crate::resources::ResourceKind;

/// Builds the request payload from the validated arguments
pub type RequestFn = fn(&InvocationContext<'_>) -> Result<Option<Value>, HandlerError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Get,
    List,
    /// PUT
    CreateOrUpdate,
    /// PATCH
    Update,
    Delete,
    /// POST `<resource>/<action>`
    Action(&'static str),
}

pub struct ResourceHandler {
    pub kind: &'static ResourceKind,
    pub operation: Operation,
    pub request: RequestFn,
}

/// The `body` argument as sent; absent for operations without a payload
pub fn body_request(ctx: &InvocationContext<'_>) -> Result<Option<Value>, HandlerError> {
    Ok(ctx.args.get("body").cloned())
}

impl ResourceHandler {
    pub fn new(kind: &'static ResourceKind, operation: Operation) -> Self {
        Self {
            kind,
            operation,
            request: body_request,
        }
    }

    pub fn with_request(mut self, request: RequestFn) -> Self {
        self.request = request;
        self
    }

    /// Payload for a PUT/PATCH/POST, with the configured location filled in
    /// for tracked resources on create
    fn payload(&self, ctx: &InvocationContext<'_>) -> Result<Option<Value>, HandlerError> {
        let mut body = (self.request)(ctx)?;
        if self.operation == Operation::CreateOrUpdate && self.kind.tracked {
            let body = body.get_or_insert_with(|| json!({}));
            if let Some(map) = body.as_object_mut() {
                if !map.contains_key("location") {
                    let location = ctx
                        .default_location()
                        .ok_or(HandlerError::MissingDefault {
                            field: "body.location",
                        })?;
                    map.insert("location".into(), json!(location));
                }
            }
        }
        Ok(body)
    }

    async fn resource_result(
        &self,
        ctx: &InvocationContext<'_>,
        path: &ResourcePath,
        outcome: Option<Value>,
    ) -> Result<Value, HandlerError> {
        let resource = match outcome {
            Some(value) => value,
            None => ctx.provider.get(path).await?,
        };
        Ok(json!({
            "success": true,
            "operation": ctx.tool,
            "resource": summarize(&resource),
        }))
    }
}

#[async_trait]
impl ToolHandler for ResourceHandler {
    async fn call(&self, ctx: InvocationContext<'_>) -> Result<Value, HandlerError> {
        let provider = ctx.provider;
        match self.operation {
            Operation::List => {
                let collection = self.kind.collection_path(&ctx)?;
                debug!("Listing {}", collection.arm_id());
                let items = collect_all(provider.list(&collection)).await?;
                Ok(json!({
                    "success": true,
                    "operation": ctx.tool,
                    "count": items.len(),
                    "items": items.iter().map(summarize).collect::<Vec<_>>(),
                }))
            }
            Operation::Get => {
                let path = self.kind.path(&ctx)?;
                let resource = provider.get(&path).await?;
                self.resource_result(&ctx, &path, Some(resource)).await
            }
            Operation::CreateOrUpdate => {
                let path = self.kind.path(&ctx)?;
                let body = self.payload(&ctx)?.unwrap_or_else(|| json!({}));
                let mut op = provider.begin_create_or_update(&path, body).await?;
                let outcome = op.poll_until_done().await?;
                self.resource_result(&ctx, &path, outcome).await
            }
            Operation::Update => {
                let path = self.kind.path(&ctx)?;
                let body = self.payload(&ctx)?.unwrap_or_else(|| json!({}));
                let mut op = provider.begin_update(&path, body).await?;
                let outcome = op.poll_until_done().await?;
                self.resource_result(&ctx, &path, outcome).await
            }
            Operation::Delete => {
                let path = self.kind.path(&ctx)?;
                let mut op = provider.begin_delete(&path).await?;
                op.poll_until_done().await?;
                Ok(json!({
                    "success": true,
                    "operation": ctx.tool,
                    "status": "deleted",
                    "target": path.arm_id(),
                }))
            }
            Operation::Action(action) => {
                let path = self.kind.path(&ctx)?;
                let body = self.payload(&ctx)?;
                let mut op = provider.begin_action(&path, action, body).await?;
                match op.poll_until_done().await? {
                    // Some actions answer with a report rather than the resource
                    Some(result) if result.get("id").is_none() => Ok(json!({
                        "success": true,
                        "operation": ctx.tool,
                        "result": result,
                    })),
                    outcome => self.resource_result(&ctx, &path, outcome).await,
                }
            }
        }
    }
}

/// The fields callers see of a provider resource
pub fn summarize(resource: &Value) -> Value {
    let mut out = Map::new();
    for field in ["id", "name", "type", "location"] {
        out.insert(field.into(), resource.get(field).cloned().unwrap_or(Value::Null));
    }
    out.insert(
        "provisioningState".into(),
        provisioning_state(resource).map_or(Value::Null, |s| json!(s)),
    );
    out.insert(
        "properties".into(),
        resource.get("properties").cloned().unwrap_or_else(|| json!({})),
    );
    Value::Object(out)
}
