//! Tool dispatch pipeline
//!
//! Pipeline: lookup → validate → placeholder check → handler → audit.
//! Every invocation resolves to a [`ToolOutcome`]; nothing the handler or
//! provider raises escapes as a bare error.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::AuditEvent;
use crate::context::{Collaborators, HandlerError, InvocationContext};
use crate::registry::{Registry, RegistryError, ToolInfo};
use crate::schema::{ValidationError, ValidationResult};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    #[error("invalid arguments for '{tool}': {error}")]
    InvalidArguments { tool: String, error: ValidationError },
    #[error("tool '{tool}' failed: {message}")]
    HandlerFailure {
        tool: String,
        message: String,
        /// Raw collaborator error, when the failure came from the provider
        detail: Option<Value>,
    },
}

impl DispatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::UnknownTool(_) => "UnknownTool",
            DispatchError::InvalidArguments { .. } => "InvalidArguments",
            DispatchError::HandlerFailure { .. } => "HandlerFailure",
        }
    }

    pub fn tool(&self) -> &str {
        match self {
            DispatchError::UnknownTool(tool)
            | DispatchError::InvalidArguments { tool, .. }
            | DispatchError::HandlerFailure { tool, .. } => tool,
        }
    }

    fn to_json(&self) -> Value {
        let mut error = Map::new();
        error.insert("kind".into(), json!(self.kind()));
        error.insert("tool".into(), json!(self.tool()));
        match self {
            DispatchError::UnknownTool(name) => {
                error.insert("message".into(), json!(format!("Unknown tool: {name}")));
            }
            DispatchError::InvalidArguments { error: e, .. } => {
                error.insert("message".into(), json!(e.to_string()));
                error.insert("field".into(), json!(e.path));
            }
            DispatchError::HandlerFailure { message, detail, .. } => {
                error.insert("message".into(), json!(message));
                if let Some(detail) = detail {
                    error.insert("detail".into(), detail.clone());
                }
            }
        }
        json!({"success": false, "error": error})
    }
}

/// Result of one `invoke`
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// The handler's own result, unchanged
    Completed(Value),
    /// The tool is registered without a handler
    Placeholder { tool: String },
    Failed(DispatchError),
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Completed(_))
    }

    pub fn to_json(&self) -> Value {
        match self {
            ToolOutcome::Completed(value) => value.clone(),
            ToolOutcome::Placeholder { tool } => json!({
                "success": false,
                "placeholder": true,
                "tool": tool,
                "message": format!("Tool '{tool}' is registered but not yet implemented"),
            }),
            ToolOutcome::Failed(e) => e.to_json(),
        }
    }
}

/// Stateless front door over a read-only [`Registry`]
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.registry.infos()
    }

    /// Dry-run a tool's input contract without invoking anything
    pub fn validate(&self, name: &str, raw_args: &Value) -> Result<ValidationResult, RegistryError> {
        let tool = self.registry.get_tool(name)?;
        Ok(ValidationResult::from(&tool.check(raw_args)))
    }

    /// Execute a tool through the full pipeline
    pub async fn invoke(&self, name: &str, raw_args: Value, collab: &Collaborators) -> ToolOutcome {
        let execution_id = Uuid::new_v4().to_string();
        let start = Instant::now();
        let audit = |operation: &str, metadata: Value| {
            collab
                .audit
                .record(AuditEvent::new(operation, &collab.actor, name, metadata));
        };

        // 1. Lookup
        let tool = match self.registry.get_tool(name) {
            Ok(tool) => tool,
            Err(_) => {
                warn!("Unknown tool requested: {name} actor={}", collab.actor);
                audit("tool.unknown", json!({"executionId": execution_id}));
                return ToolOutcome::Failed(DispatchError::UnknownTool(name.to_string()));
            }
        };

        // 2. Validate before any side effect
        let args = match tool.check(&raw_args) {
            Ok(args) => args,
            Err(error) => return self.reject(name, &execution_id, error, &audit),
        };

        // 3. Placeholder
        let Some(handler) = &tool.handler else {
            info!("Placeholder tool invoked: {name}");
            audit("tool.placeholder", json!({"executionId": execution_id}));
            return ToolOutcome::Placeholder {
                tool: name.to_string(),
            };
        };

        info!(
            "Executing: actor={} tool={} execution={}",
            collab.actor, name, execution_id
        );

        // 4. Handler
        let ctx = InvocationContext {
            tool: name,
            execution_id: &execution_id,
            args,
            provider: collab.provider.as_ref(),
            defaults: &collab.defaults,
            audit: collab.audit.as_ref(),
            actor: &collab.actor,
        };
        let result = handler.call(ctx).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        // 5. Normalize + audit
        match result {
            Ok(value) => {
                audit(
                    "tool.completed",
                    json!({"executionId": execution_id, "durationMs": duration_ms}),
                );
                ToolOutcome::Completed(value)
            }
            Err(HandlerError::MissingDefault { field }) => self.reject(
                name,
                &execution_id,
                ValidationError::new(field, "not supplied and no default is configured"),
                &audit,
            ),
            Err(e) => {
                let detail = match &e {
                    HandlerError::Provider(p) => Some(p.detail()),
                    _ => None,
                };
                warn!("Tool {name} failed after {duration_ms}ms: {e}");
                audit(
                    "tool.failed",
                    json!({
                        "executionId": execution_id,
                        "durationMs": duration_ms,
                        "message": e.to_string(),
                    }),
                );
                ToolOutcome::Failed(DispatchError::HandlerFailure {
                    tool: name.to_string(),
                    message: e.to_string(),
                    detail,
                })
            }
        }
    }

    fn reject(
        &self,
        name: &str,
        execution_id: &str,
        error: ValidationError,
        audit: &dyn Fn(&str, Value),
    ) -> ToolOutcome {
        warn!("Rejected arguments for {name}: {error}");
        audit(
            "tool.rejected",
            json!({"executionId": execution_id, "field": error.path, "message": error.message}),
        );
        ToolOutcome::Failed(DispatchError::InvalidArguments {
            tool: name.to_string(),
            error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditSink, TracingAudit};
    use crate::context::ToolHandler;
    use crate::provider::memory::InMemoryProvider;
    use crate::provider::ProviderError;
    use crate::registry::Tool;
    use crate::schema::Schema;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<AuditEvent>>);

    impl AuditSink for Recorder {
        fn record(&self, event: AuditEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    struct Fails;

    #[async_trait]
    impl ToolHandler for Fails {
        async fn call(&self, _ctx: InvocationContext<'_>) -> Result<Value, HandlerError> {
            Err(ProviderError::not_found("/subscriptions/s").into())
        }
    }

    struct NeedsScope;

    #[async_trait]
    impl ToolHandler for NeedsScope {
        async fn call(&self, ctx: InvocationContext<'_>) -> Result<Value, HandlerError> {
            let rg = ctx.resource_group()?;
            Ok(json!({"success": true, "rg": rg}))
        }
    }

    fn dispatcher() -> Dispatcher {
        let schema = Schema::object()
            .optional("resourceGroupName", Schema::string())
            .required("accountName", Schema::string().min_len(1));
        let mut reg = Registry::new();
        reg.register_tool(Tool::new("scoped", "", schema.clone()).with_handler(NeedsScope))
            .unwrap();
        reg.register_tool(Tool::new("broken", "", schema.clone()).with_handler(Fails))
            .unwrap();
        reg.register_tool(Tool::new("later", "", schema)).unwrap();
        Dispatcher::new(reg)
    }

    fn collab(audit: Arc<Recorder>) -> Collaborators {
        Collaborators::new(Arc::new(InMemoryProvider::new()), audit).with_actor("tester")
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let audit = Arc::new(Recorder::default());
        let outcome = dispatcher().invoke("nope", json!({}), &collab(audit.clone())).await;
        assert_eq!(
            outcome,
            ToolOutcome::Failed(DispatchError::UnknownTool("nope".into()))
        );
        assert_eq!(outcome.to_json()["error"]["kind"], "UnknownTool");
        assert_eq!(audit.0.lock().unwrap()[0].operation, "tool.unknown");
    }

    #[tokio::test]
    async fn test_rejection_names_field() {
        let audit = Arc::new(Recorder::default());
        let outcome = dispatcher()
            .invoke("scoped", json!({"accountName": ""}), &collab(audit.clone()))
            .await;
        let wire = outcome.to_json();
        assert_eq!(wire["success"], false);
        assert_eq!(wire["error"]["kind"], "InvalidArguments");
        assert_eq!(wire["error"]["field"], "accountName");
        let events = audit.0.lock().unwrap();
        assert_eq!(events[0].operation, "tool.rejected");
        assert_eq!(events[0].actor, "tester");
    }

    #[tokio::test]
    async fn test_placeholder_is_distinct_from_failure() {
        let collab = Collaborators::new(Arc::new(InMemoryProvider::new()), Arc::new(TracingAudit));
        let outcome = dispatcher().invoke("later", json!({"accountName": "a"}), &collab).await;
        assert!(!outcome.is_success());
        let wire = outcome.to_json();
        assert_eq!(wire["placeholder"], true);
        assert_eq!(wire["success"], false);
        assert!(wire.get("error").is_none());
    }

    #[tokio::test]
    async fn test_handler_failure_carries_detail() {
        let audit = Arc::new(Recorder::default());
        let outcome = dispatcher()
            .invoke("broken", json!({"accountName": "a"}), &collab(audit.clone()))
            .await;
        let wire = outcome.to_json();
        assert_eq!(wire["error"]["kind"], "HandlerFailure");
        assert_eq!(wire["error"]["detail"]["status"], 404);
        assert!(wire["error"]["message"].as_str().unwrap().contains("ResourceNotFound"));
        assert_eq!(audit.0.lock().unwrap()[0].operation, "tool.failed");
    }

    #[tokio::test]
    async fn test_missing_default_is_invalid_arguments() {
        let audit = Arc::new(Recorder::default());
        let d = dispatcher();
        let outcome = d.invoke("scoped", json!({"accountName": "a"}), &collab(audit.clone())).await;
        match outcome {
            ToolOutcome::Failed(DispatchError::InvalidArguments { error, .. }) => {
                assert_eq!(error.path, "resourceGroupName")
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let outcome = d
            .invoke(
                "scoped",
                json!({"accountName": "a", "resourceGroupName": "rg1"}),
                &collab(audit),
            )
            .await;
        assert_eq!(outcome, ToolOutcome::Completed(json!({"success": true, "rg": "rg1"})));
    }

    #[test]
    fn test_validate_dry_run() {
        let d = dispatcher();
        assert!(d.validate("scoped", &json!({"accountName": "a"})).unwrap().valid);
        assert!(!d.validate("scoped", &json!({})).unwrap().valid);
        assert!(d.validate("nope", &json!({})).is_err());
    }
}
