//! What a handler receives for one call

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::audit::AuditSink;
use crate::provider::{NetAppProvider, ProviderError};

/// Ambient ARM scope used when a request omits it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Defaults {
    pub subscription_id: Option<String>,
    pub resource_group: Option<String>,
    pub location: Option<String>,
}

/// Collaborators supplied by the transport for each invocation
#[derive(Clone)]
pub struct Collaborators {
    pub provider: Arc<dyn NetAppProvider>,
    pub defaults: Defaults,
    pub audit: Arc<dyn AuditSink>,
    /// Caller identity recorded in audit events
    pub actor: String,
}

impl Collaborators {
    pub fn new(provider: Arc<dyn NetAppProvider>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            provider,
            defaults: Defaults::default(),
            audit,
            actor: "system".to_string(),
        }
    }

    pub fn with_defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("{field} was not supplied and no default is configured")]
    MissingDefault { field: &'static str },
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Borrowed view handed to a handler; dropped when the handler returns
pub struct InvocationContext<'a> {
    pub tool: &'a str,
    pub execution_id: &'a str,
    /// Arguments as normalized by the tool's schema
    pub args: Value,
    pub provider: &'a dyn NetAppProvider,
    pub defaults: &'a Defaults,
    pub audit: &'a dyn AuditSink,
    pub actor: &'a str,
}

impl<'a> InvocationContext<'a> {
    pub fn arg_str(&self, name: &str) -> Option<&str> {
        self.args.get(name).and_then(Value::as_str)
    }

    fn arg_or_default(
        &self,
        name: &str,
        default: &'a Option<String>,
        field: &'static str,
    ) -> Result<String, HandlerError> {
        self.arg_str(name)
            .or(default.as_deref())
            .map(str::to_string)
            .ok_or(HandlerError::MissingDefault { field })
    }

    pub fn subscription_id(&self) -> Result<String, HandlerError> {
        self.arg_or_default("subscriptionId", &self.defaults.subscription_id, "subscriptionId")
    }

    pub fn resource_group(&self) -> Result<String, HandlerError> {
        self.arg_or_default(
            "resourceGroupName",
            &self.defaults.resource_group,
            "resourceGroupName",
        )
    }

    pub fn default_location(&self) -> Option<&str> {
        self.defaults.location.as_deref()
    }

    /// The request payload, `{}` when the operation takes none
    pub fn body(&self) -> Value {
        self.args
            .get("body")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()))
    }
}

/// Effectful half of a tool
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, ctx: InvocationContext<'_>) -> Result<Value, HandlerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::TracingAudit;
    use crate::provider::memory::InMemoryProvider;
    use serde_json::json;

    fn context<'a>(
        args: Value,
        defaults: &'a Defaults,
        provider: &'a InMemoryProvider,
    ) -> InvocationContext<'a> {
        InvocationContext {
            tool: "anf_accounts_get",
            execution_id: "exec-1",
            args,
            provider,
            defaults,
            audit: &TracingAudit,
            actor: "tester",
        }
    }

    #[test]
    fn test_explicit_scope_wins_over_defaults() {
        let provider = InMemoryProvider::new();
        let defaults = Defaults {
            subscription_id: Some("default-sub".into()),
            resource_group: Some("default-rg".into()),
            location: None,
        };
        let ctx = context(
            json!({"subscriptionId": "sub", "resourceGroupName": "rg1"}),
            &defaults,
            &provider,
        );
        assert_eq!(ctx.subscription_id().unwrap(), "sub");
        assert_eq!(ctx.resource_group().unwrap(), "rg1");
    }

    #[test]
    fn test_scope_falls_back_to_defaults() {
        let provider = InMemoryProvider::new();
        let defaults = Defaults {
            subscription_id: Some("default-sub".into()),
            resource_group: None,
            location: Some("eastus".into()),
        };
        let ctx = context(json!({}), &defaults, &provider);
        assert_eq!(ctx.subscription_id().unwrap(), "default-sub");
        assert!(matches!(
            ctx.resource_group(),
            Err(HandlerError::MissingDefault { field: "resourceGroupName" })
        ));
        assert_eq!(ctx.default_location(), Some("eastus"));
    }

    #[test]
    fn test_body_defaults_to_empty_object() {
        let provider = InMemoryProvider::new();
        let defaults = Defaults::default();
        assert_eq!(context(json!({}), &defaults, &provider).body(), json!({}));
        assert_eq!(
            context(json!({"body": {"tags": {}}}), &defaults, &provider).body(),
            json!({"tags": {}})
        );
    }
}
