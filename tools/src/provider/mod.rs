//! The narrow contract handlers use to reach the
//! NetApp management plane.
//!
//! Handlers see resources as opaque JSON and mutations as long-running
//! operations they drive to a terminal state. Two implementations ship:
//! [`arm::ArmProvider`] talks to Azure Resource Manager over REST and
//! [`memory::InMemoryProvider`] keeps resources in process.

pub mod arm;
pub mod credential;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

const PROVIDER_NAMESPACE: &str = "Microsoft.NetApp";

/// Failure reported by the provider or the transport in front of it
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("provider returned {status} {code}: {message}")]
    Http {
        status: u16,
        code: String,
        message: String,
    },
    #[error("long-running operation ended {status}: {message}")]
    OperationFailed { status: String, message: String },
    #[error("operation did not reach a terminal state within {0:?}")]
    Timeout(Duration),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn not_found(id: &str) -> Self {
        ProviderError::Http {
            status: 404,
            code: "ResourceNotFound".to_string(),
            message: format!("The resource '{id}' was not found."),
        }
    }

    /// Raw collaborator detail republished alongside a handler failure
    pub fn detail(&self) -> Value {
        match self {
            ProviderError::Http { status, code, .. } => json!({"status": status, "code": code}),
            ProviderError::OperationFailed { status, .. } => json!({"operationStatus": status}),
            ProviderError::Timeout(after) => json!({"timeoutSeconds": after.as_secs()}),
            ProviderError::Auth(_) => json!({"code": "AuthenticationFailed"}),
            ProviderError::Transport(_) => json!({"code": "TransportError"}),
            ProviderError::Decode(_) => json!({"code": "MalformedResponse"}),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::Decode(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

/// Location of a NetApp resource (or a collection of them) under ARM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePath {
    pub subscription_id: String,
    pub resource_group: String,
    /// `(resource type segment, name)` pairs from the account downwards
    pub segments: Vec<(&'static str, String)>,
    /// Trailing collection segment when the path names a list
    pub collection: Option<&'static str>,
}

impl ResourcePath {
    pub fn new(subscription_id: impl Into<String>, resource_group: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            segments: Vec::new(),
            collection: None,
        }
    }

    pub fn child(mut self, kind: &'static str, name: impl Into<String>) -> Self {
        self.segments.push((kind, name.into()));
        self
    }

    pub fn collection(mut self, kind: &'static str) -> Self {
        self.collection = Some(kind);
        self
    }

    pub fn is_collection(&self) -> bool {
        self.collection.is_some()
    }

    /// ARM resource ID, e.g.
    /// `/subscriptions/s/resourceGroups/rg/providers/Microsoft.NetApp/netAppAccounts/a`
    pub fn arm_id(&self) -> String {
        let mut id = format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{PROVIDER_NAMESPACE}",
            self.subscription_id, self.resource_group
        );
        for (kind, name) in &self.segments {
            id.push('/');
            id.push_str(kind);
            id.push('/');
            id.push_str(name);
        }
        if let Some(kind) = self.collection {
            id.push('/');
            id.push_str(kind);
        }
        id
    }

    /// ARM resource type, e.g. `Microsoft.NetApp/netAppAccounts/capacityPools`
    pub fn resource_type(&self) -> String {
        let mut t = PROVIDER_NAMESPACE.to_string();
        for kind in self
            .segments
            .iter()
            .map(|(kind, _)| *kind)
            .chain(self.collection)
        {
            t.push('/');
            t.push_str(kind);
        }
        t
    }

    /// ARM child resources are named by their full chain: `acct1/pool1/vol1`
    pub fn resource_name(&self) -> String {
        self.segments
            .iter()
            .map(|(_, name)| name.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Path of the enclosing resource, if any
    pub fn parent(&self) -> Option<ResourcePath> {
        let mut parent = self.clone();
        if parent.collection.take().is_none() {
            parent.segments.pop()?;
        }
        if parent.segments.is_empty() {
            None
        } else {
            Some(parent)
        }
    }
}

/// Pages of a list result; each call to `list` starts a fresh walk
#[async_trait]
pub trait Pager: Send {
    /// Next page of items, or `None` once the listing is exhausted
    async fn next_page(&mut self) -> Result<Option<Vec<Value>>, ProviderError>;
}

/// Drain every page of a listing
pub async fn collect_all(mut pager: Box<dyn Pager>) -> Result<Vec<Value>, ProviderError> {
    let mut items = Vec::new();
    while let Some(page) = pager.next_page().await? {
        items.extend(page);
    }
    Ok(items)
}

/// Handle for a provider-side asynchronous operation
#[async_trait]
pub trait LongRunningOperation: Send {
    /// Block until the operation is terminal.
    ///
    /// Resolves to the final resource body (`None` for deletes) or the
    /// failure the provider reported.
    async fn poll_until_done(&mut self) -> Result<Option<Value>, ProviderError>;
}

/// An operation the provider finished synchronously
pub struct Completed(pub Option<Value>);

#[async_trait]
impl LongRunningOperation for Completed {
    async fn poll_until_done(&mut self) -> Result<Option<Value>, ProviderError> {
        Ok(self.0.take())
    }
}

/// NetApp management operations, addressed by [`ResourcePath`]
#[async_trait]
pub trait NetAppProvider: Send + Sync {
    async fn get(&self, resource: &ResourcePath) -> Result<Value, ProviderError>;

    /// Lazily list a collection; no request is made until the first page is pulled
    fn list(&self, collection: &ResourcePath) -> Box<dyn Pager>;

    /// PUT the resource
    async fn begin_create_or_update(
        &self,
        resource: &ResourcePath,
        body: Value,
    ) -> Result<Box<dyn LongRunningOperation>, ProviderError>;

    /// PATCH the resource
    async fn begin_update(
        &self,
        resource: &ResourcePath,
        body: Value,
    ) -> Result<Box<dyn LongRunningOperation>, ProviderError>;

    async fn begin_delete(
        &self,
        resource: &ResourcePath,
    ) -> Result<Box<dyn LongRunningOperation>, ProviderError>;

    /// POST `<resource>/<action>`
    async fn begin_action(
        &self,
        resource: &ResourcePath,
        action: &str,
        body: Option<Value>,
    ) -> Result<Box<dyn LongRunningOperation>, ProviderError>;
}

/// Provisioning states after which a resource no longer changes on its own
pub fn is_terminal_state(state: &str) -> bool {
    matches!(
        state.to_ascii_lowercase().as_str(),
        "succeeded" | "failed" | "canceled" | "cancelled"
    )
}

pub fn provisioning_state(resource: &Value) -> Option<&str> {
    resource
        .pointer("/properties/provisioningState")
        .and_then(Value::as_str)
}
