//! Azure NetApp Files tools: validated dispatch for management-plane operations
//!
//! Each tool pairs an input schema with an optional handler. Requests flow
//! through one pipeline: lookup → validate → handler → provider → outcome.
//! The schema is the single source for both enforcement and the descriptor
//! callers introspect.

pub mod audit;
pub mod context;
pub mod descriptor;
pub mod dispatcher;
pub mod fields;
pub mod handler;
pub mod provider;
pub mod registry;
pub mod resources;
pub mod schema;

pub use audit::{AuditEvent, AuditLog, AuditSink, TracingAudit};
pub use context::{Collaborators, Defaults, HandlerError, InvocationContext, ToolHandler};
pub use descriptor::to_descriptor;
pub use dispatcher::{DispatchError, Dispatcher, ToolOutcome};
pub use provider::{NetAppProvider, ProviderError, ResourcePath};
pub use registry::{Registry, RegistryError, Tool, ToolInfo};
pub use schema::{Schema, ValidationError, ValidationResult};
