//! Capacity pools

use serde_json::Value;

use super::{ResourceKind, ACCOUNT, POOL};
use crate::fields;
use crate::registry::{Registry, RegistryError};
use crate::schema::{ObjectSchema, Schema, ValidationError};

pub static POOLS: ResourceKind = ResourceKind {
    label: "pools",
    chain: &[ACCOUNT, POOL],
    tracked: true,
};

const UPDATABLE: [&str; 3] = ["size", "qosType", "coolAccess"];

fn cool_access() -> Schema {
    Schema::boolean()
        .describe("Enable cool access tiering for volumes in the pool")
        .into()
}

fn create_body() -> ObjectSchema {
    Schema::object()
        .optional("location", fields::location())
        .required(
            "properties",
            Schema::object()
                .required("serviceLevel", fields::service_level())
                .required("size", fields::pool_size())
                .optional("qosType", fields::qos_type())
                .optional("coolAccess", cool_access())
                .optional("encryptionType", Schema::one_of(&["Single", "Double"])),
        )
}

fn update_body() -> ObjectSchema {
    Schema::object().required(
        "properties",
        Schema::object()
            .optional("size", fields::pool_size())
            .optional("qosType", fields::qos_type())
            .optional("coolAccess", cool_access()),
    )
}

/// A pool PATCH must change something
fn require_change(raw: &Value) -> Result<(), ValidationError> {
    let Some(properties) = raw.pointer("/body/properties").and_then(Value::as_object) else {
        return Ok(());
    };
    if UPDATABLE.iter().any(|k| properties.contains_key(*k)) {
        Ok(())
    } else {
        Err(ValidationError::new(
            "body.properties",
            "specify at least one of size, qosType or coolAccess",
        ))
    }
}

pub fn register_tools(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register_tool(POOLS.list_tool("List capacity pools in a NetApp account"))?;
    registry.register_tool(POOLS.get_tool("Get a capacity pool"))?;
    registry.register_tool(POOLS.put_tool(
        "create_or_update",
        "Create or replace a capacity pool (size 4 TiB to 500 TiB, in bytes)",
        create_body(),
    ))?;
    registry.register_tool(
        POOLS
            .update_tool(
                "Resize a capacity pool or change its QoS type or cool access",
                update_body(),
            )
            .with_validate(require_change),
    )?;
    registry.register_tool(POOLS.delete_tool("Delete a capacity pool"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_requires_a_change() {
        let err = require_change(&json!({"body": {"properties": {}}})).unwrap_err();
        assert_eq!(err.path, "body.properties");
        assert!(require_change(&json!({"body": {"properties": {"coolAccess": true}}})).is_ok());
        // Structural problems are left to the schema
        assert!(require_change(&json!({})).is_ok());
    }

    #[test]
    fn test_create_requires_service_level_and_size() {
        let err = create_body()
            .validate(&json!({"properties": {"size": fields::POOL_MIN_BYTES}}))
            .unwrap_err();
        assert_eq!(err.path, "properties.serviceLevel");

        assert!(create_body()
            .validate(&json!({"properties": {"serviceLevel": "Ultra", "size": fields::POOL_MIN_BYTES}}))
            .is_ok());
    }
}
