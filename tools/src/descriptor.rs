//! Schema → descriptor projection
//!
//! Produces a JSON-Schema document callers can introspect without running the
//! validator. Every constraint the validator enforces appears here and nothing
//! else does: undeclared object keys are tolerated (and dropped) by the
//! validator, so `additionalProperties` is never advertised.

use serde_json::{json, Map, Value};

use crate::schema::Schema;

/// Project `schema` into its transport-visible descriptor
pub fn to_descriptor(schema: &Schema) -> Value {
    let mut node = Map::new();
    match schema {
        Schema::String(s) => {
            node.insert("type".into(), json!("string"));
            if let Some(min) = s.min_len {
                node.insert("minLength".into(), json!(min));
            }
            if let Some(max) = s.max_len {
                node.insert("maxLength".into(), json!(max));
            }
            if let Some(re) = &s.pattern {
                node.insert("pattern".into(), json!(re.as_str()));
            }
        }
        Schema::Number(n) => {
            node.insert(
                "type".into(),
                json!(if n.integer { "integer" } else { "number" }),
            );
            if let Some(min) = n.minimum {
                node.insert("minimum".into(), bound(min, n.integer));
            }
            if let Some(max) = n.maximum {
                node.insert("maximum".into(), bound(max, n.integer));
            }
        }
        Schema::Boolean(_) => {
            node.insert("type".into(), json!("boolean"));
        }
        Schema::Enum(e) => {
            node.insert("type".into(), json!("string"));
            node.insert("enum".into(), json!(e.values));
        }
        Schema::Object(o) => {
            node.insert("type".into(), json!("object"));
            let properties: Map<String, Value> = o
                .fields
                .iter()
                .map(|f| (f.name.clone(), to_descriptor(&f.schema)))
                .collect();
            node.insert("properties".into(), Value::Object(properties));
            let required = o.required_fields();
            if !required.is_empty() {
                node.insert("required".into(), json!(required));
            }
        }
        Schema::Array(a) => {
            node.insert("type".into(), json!("array"));
            node.insert("items".into(), to_descriptor(&a.items));
            if let Some(min) = a.min_items {
                node.insert("minItems".into(), json!(min));
            }
            if let Some(max) = a.max_items {
                node.insert("maxItems".into(), json!(max));
            }
        }
    }
    if let Some(text) = schema.description() {
        node.insert("description".into(), json!(text));
    }
    Value::Object(node)
}

fn bound(value: f64, integer: bool) -> Value {
    if integer {
        json!(value as i64)
    } else {
        json!(value)
    }
}
