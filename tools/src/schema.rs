//! Validation schemas: composable constraint trees for tool inputs
//!
//! A [`Schema`] both enforces a contract ([`Schema::validate`]) and projects to
//! a transport-visible descriptor ([`crate::descriptor::to_descriptor`]). Both
//! views walk the same tree, so the advertised and enforced contracts cannot
//! drift apart.
//!
//! Validation stops at the first violation and names it by field path
//! (`body.properties.size`, `filePaths[0]`).

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

/// First violation found while validating a value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {message}")]
pub struct ValidationError {
    /// Dotted field path; `arguments` for the root value
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            path: if path.is_empty() { "arguments".to_string() } else { path },
            message: message.into(),
        }
    }
}

/// Serializable verdict: a request either fully satisfies its schema or is rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> From<&Result<T, ValidationError>> for ValidationResult {
    fn from(result: &Result<T, ValidationError>) -> Self {
        match result {
            Ok(_) => Self { valid: true, error: None },
            Err(e) => Self {
                valid: false,
                error: Some(e.to_string()),
            },
        }
    }
}

/// A constraint node
#[derive(Debug, Clone)]
pub enum Schema {
    String(StringSchema),
    Number(NumberSchema),
    Boolean(BooleanSchema),
    Enum(EnumSchema),
    Object(ObjectSchema),
    Array(ArraySchema),
}

impl Schema {
    pub fn string() -> StringSchema {
        StringSchema::default()
    }

    pub fn integer() -> NumberSchema {
        NumberSchema {
            integer: true,
            ..NumberSchema::default()
        }
    }

    pub fn number() -> NumberSchema {
        NumberSchema::default()
    }

    pub fn boolean() -> BooleanSchema {
        BooleanSchema::default()
    }

    pub fn one_of(values: &[&'static str]) -> EnumSchema {
        EnumSchema {
            values: values.to_vec(),
            description: None,
        }
    }

    pub fn object() -> ObjectSchema {
        ObjectSchema::default()
    }

    pub fn array(items: impl Into<Schema>) -> ArraySchema {
        ArraySchema {
            items: Box::new(items.into()),
            min_items: None,
            max_items: None,
            description: None,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Schema::String(s) => s.description.as_deref(),
            Schema::Number(n) => n.description.as_deref(),
            Schema::Boolean(b) => b.description.as_deref(),
            Schema::Enum(e) => e.description.as_deref(),
            Schema::Object(o) => o.description.as_deref(),
            Schema::Array(a) => a.description.as_deref(),
        }
    }

    /// Validate `value`, returning the normalized value on success.
    ///
    /// Objects are rebuilt from their declared fields only; undeclared keys
    /// are dropped rather than forwarded.
    pub fn validate(&self, value: &Value) -> Result<Value, ValidationError> {
        self.validate_at(value, "")
    }

    fn validate_at(&self, value: &Value, path: &str) -> Result<Value, ValidationError> {
        match self {
            Schema::String(s) => s.validate_at(value, path),
            Schema::Number(n) => n.validate_at(value, path),
            Schema::Boolean(_) => match value {
                Value::Bool(_) => Ok(value.clone()),
                other => Err(type_mismatch(path, "boolean", other)),
            },
            Schema::Enum(e) => e.validate_at(value, path),
            Schema::Object(o) => o.validate_at(value, path),
            Schema::Array(a) => a.validate_at(value, path),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_mismatch(path: &str, expected: &str, got: &Value) -> ValidationError {
    ValidationError::new(path, format!("expected {expected}, got {}", kind_of(got)))
}

fn join(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{path}.{field}")
    }
}

#[derive(Debug, Clone, Default)]
pub struct StringSchema {
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
    pub pattern: Option<Regex>,
    pub description: Option<String>,
}

impl StringSchema {
    pub fn min_len(mut self, n: usize) -> Self {
        self.min_len = Some(n);
        self
    }

    pub fn max_len(mut self, n: usize) -> Self {
        self.max_len = Some(n);
        self
    }

    pub fn pattern(mut self, re: &Regex) -> Self {
        self.pattern = Some(re.clone());
        self
    }

    pub fn describe(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    // presence, then length, then pattern
    fn validate_at(&self, value: &Value, path: &str) -> Result<Value, ValidationError> {
        let Value::String(s) = value else {
            return Err(type_mismatch(path, "string", value));
        };
        let len = s.chars().count();
        if let Some(min) = self.min_len {
            if len < min {
                return Err(ValidationError::new(
                    path,
                    format!("must be at least {min} character(s) long"),
                ));
            }
        }
        if let Some(max) = self.max_len {
            if len > max {
                return Err(ValidationError::new(
                    path,
                    format!("must be at most {max} characters long"),
                ));
            }
        }
        if let Some(re) = &self.pattern {
            if !re.is_match(s) {
                return Err(ValidationError::new(
                    path,
                    format!("'{s}' does not match pattern {}", re.as_str()),
                ));
            }
        }
        Ok(value.clone())
    }
}

/// Numeric constraint; bounds are inclusive
#[derive(Debug, Clone, Default)]
pub struct NumberSchema {
    pub integer: bool,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub description: Option<String>,
}

impl NumberSchema {
    pub fn min(mut self, n: f64) -> Self {
        self.minimum = Some(n);
        self
    }

    pub fn max(mut self, n: f64) -> Self {
        self.maximum = Some(n);
        self
    }

    pub fn describe(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    fn validate_at(&self, value: &Value, path: &str) -> Result<Value, ValidationError> {
        let expected = if self.integer { "integer" } else { "number" };
        let Some(n) = value.as_f64() else {
            return Err(type_mismatch(path, expected, value));
        };
        if self.integer && n.fract() != 0.0 {
            return Err(ValidationError::new(path, format!("expected integer, got {n}")));
        }
        if let Some(min) = self.minimum {
            if n < min {
                return Err(ValidationError::new(
                    path,
                    format!("must be >= {}", render_bound(min, self.integer)),
                ));
            }
        }
        if let Some(max) = self.maximum {
            if n > max {
                return Err(ValidationError::new(
                    path,
                    format!("must be <= {}", render_bound(max, self.integer)),
                ));
            }
        }
        if self.integer && value.is_f64() {
            // `4.0` passes as an integer; hand it on as one
            return Ok(Value::from(n as i64));
        }
        Ok(value.clone())
    }
}

fn render_bound(bound: f64, integer: bool) -> String {
    if integer {
        format!("{}", bound as i64)
    } else {
        format!("{bound}")
    }
}

#[derive(Debug, Clone, Default)]
pub struct BooleanSchema {
    pub description: Option<String>,
}

impl BooleanSchema {
    pub fn describe(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }
}

/// A fixed set of accepted string literals
#[derive(Debug, Clone)]
pub struct EnumSchema {
    pub values: Vec<&'static str>,
    pub description: Option<String>,
}

impl EnumSchema {
    pub fn describe(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    fn validate_at(&self, value: &Value, path: &str) -> Result<Value, ValidationError> {
        let Value::String(s) = value else {
            return Err(type_mismatch(path, "string", value));
        };
        if self.values.iter().any(|v| v == s) {
            Ok(value.clone())
        } else {
            Err(ValidationError::new(
                path,
                format!("'{s}' is not one of: {}", self.values.join(", ")),
            ))
        }
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub schema: Schema,
    pub required: bool,
}

/// Named fields, each required or optional, validated in declaration order
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    pub fields: Vec<Field>,
    pub description: Option<String>,
}

impl ObjectSchema {
    pub fn required(self, name: &str, schema: impl Into<Schema>) -> Self {
        self.field(name, schema.into(), true)
    }

    pub fn optional(self, name: &str, schema: impl Into<Schema>) -> Self {
        self.field(name, schema.into(), false)
    }

    /// Add or replace a field; a replaced field keeps its position
    fn field(mut self, name: &str, schema: Schema, required: bool) -> Self {
        let field = Field {
            name: name.to_string(),
            schema,
            required,
        };
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    pub fn describe(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect()
    }

    pub fn validate(&self, value: &Value) -> Result<Value, ValidationError> {
        self.validate_at(value, "")
    }

    fn validate_at(&self, value: &Value, path: &str) -> Result<Value, ValidationError> {
        let Value::Object(input) = value else {
            return Err(type_mismatch(path, "object", value));
        };
        let mut out = Map::new();
        for field in &self.fields {
            let field_path = join(path, &field.name);
            match input.get(&field.name) {
                Some(v) => {
                    out.insert(field.name.clone(), field.schema.validate_at(v, &field_path)?);
                }
                None if field.required => {
                    return Err(ValidationError::new(field_path, "missing required field"));
                }
                None => {}
            }
        }
        Ok(Value::Object(out))
    }
}

#[derive(Debug, Clone)]
pub struct ArraySchema {
    pub items: Box<Schema>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub description: Option<String>,
}

impl ArraySchema {
    pub fn min_items(mut self, n: usize) -> Self {
        self.min_items = Some(n);
        self
    }

    pub fn max_items(mut self, n: usize) -> Self {
        self.max_items = Some(n);
        self
    }

    pub fn describe(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    fn validate_at(&self, value: &Value, path: &str) -> Result<Value, ValidationError> {
        let Value::Array(items) = value else {
            return Err(type_mismatch(path, "array", value));
        };
        if let Some(min) = self.min_items {
            if items.len() < min {
                return Err(ValidationError::new(
                    path,
                    format!("must contain at least {min} item(s)"),
                ));
            }
        }
        if let Some(max) = self.max_items {
            if items.len() > max {
                return Err(ValidationError::new(
                    path,
                    format!("must contain at most {max} items"),
                ));
            }
        }
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.items.validate_at(item, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }
}

impl From<StringSchema> for Schema {
    fn from(s: StringSchema) -> Self {
        Schema::String(s)
    }
}

impl From<NumberSchema> for Schema {
    fn from(n: NumberSchema) -> Self {
        Schema::Number(n)
    }
}

impl From<BooleanSchema> for Schema {
    fn from(b: BooleanSchema) -> Self {
        Schema::Boolean(b)
    }
}

impl From<EnumSchema> for Schema {
    fn from(e: EnumSchema) -> Self {
        Schema::Enum(e)
    }
}

impl From<ObjectSchema> for Schema {
    fn from(o: ObjectSchema) -> Self {
        Schema::Object(o)
    }
}

impl From<ArraySchema> for Schema {
    fn from(a: ArraySchema) -> Self {
        Schema::Array(a)
    }
}
