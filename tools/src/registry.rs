//! Tool Registry: stores and retrieves tool definitions

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::context::ToolHandler;
use crate::descriptor::to_descriptor;
use crate::schema::{ObjectSchema, Schema, ValidationError};

/// Custom pre-check run on the raw arguments before the schema
pub type ValidateFn = fn(&Value) -> Result<(), ValidationError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    DuplicateToolName(String),
    #[error("tool '{0}' not found")]
    NotFound(String),
    #[error("descriptor for tool '{name}' is not a valid JSON Schema: {reason}")]
    InvalidDescriptor { name: String, reason: String },
}

/// A named operation: input contract plus optional handler.
///
/// Immutable once registered. A tool without a handler is a placeholder.
#[derive(Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: ObjectSchema,
    input_descriptor: Value,
    pub validate: Option<ValidateFn>,
    pub handler: Option<Arc<dyn ToolHandler>>,
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("placeholder", &self.is_placeholder())
            .field("custom_validate", &self.validate.is_some())
            .finish()
    }
}

impl Tool {
    pub fn new(name: &str, description: &str, input_schema: ObjectSchema) -> Self {
        let input_descriptor = to_descriptor(&Schema::Object(input_schema.clone()));
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
            input_descriptor,
            validate: None,
            handler: None,
        }
    }

    pub fn with_validate(mut self, validate: ValidateFn) -> Self {
        self.validate = Some(validate);
        self
    }

    pub fn with_handler(mut self, handler: impl ToolHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.handler.is_none()
    }

    pub fn input_descriptor(&self) -> &Value {
        &self.input_descriptor
    }

    /// Run the custom pre-check (if any), then the schema.
    ///
    /// Returns the schema-normalized arguments.
    pub fn check(&self, raw: &Value) -> Result<Value, ValidationError> {
        if let Some(validate) = self.validate {
            validate(raw)?;
        }
        self.input_schema.validate(raw)
    }

    pub fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_descriptor.clone(),
        }
    }
}

/// Introspection record for one tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// In-memory tool registry; read-only once startup registration is done
#[derive(Default)]
pub struct Registry {
    tools: Vec<Tool>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool definition
    pub fn register_tool(&mut self, tool: Tool) -> Result<(), RegistryError> {
        if self.index.contains_key(&tool.name) {
            return Err(RegistryError::DuplicateToolName(tool.name));
        }
        jsonschema::validator_for(&tool.input_descriptor).map_err(|e| {
            RegistryError::InvalidDescriptor {
                name: tool.name.clone(),
                reason: e.to_string(),
            }
        })?;
        debug!(
            "Registered tool: {}{}",
            tool.name,
            if tool.is_placeholder() { " (placeholder)" } else { "" }
        );
        self.index.insert(tool.name.clone(), self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn get_tool(&self, name: &str) -> Result<&Tool, RegistryError> {
        self.index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// All tools in registration order; call again to restart
    pub fn list_tools(&self) -> std::slice::Iter<'_, Tool> {
        self.tools.iter()
    }

    pub fn infos(&self) -> Vec<ToolInfo> {
        self.list_tools().map(Tool::info).collect()
    }

    /// Get total tool count
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    pub fn placeholder_count(&self) -> usize {
        self.tools.iter().filter(|t| t.is_placeholder()).count()
    }
}
