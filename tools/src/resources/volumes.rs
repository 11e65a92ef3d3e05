//! Volumes, including resize / revert / pool change and the replication
//! actions that are registered without a handler yet.

use serde_json::{json, Value};

use super::{required_arg, ResourceKind, ACCOUNT, POOL, VOLUME};
use crate::context::{HandlerError, InvocationContext};
use crate::fields;
use crate::handler::Operation;
use crate::registry::{Registry, RegistryError};
use crate::schema::{ObjectSchema, Schema};

pub static VOLUMES: ResourceKind = ResourceKind {
    label: "volumes",
    chain: &[ACCOUNT, POOL, VOLUME],
    tracked: true,
};

fn export_rule() -> Schema {
    Schema::object()
        .required("ruleIndex", Schema::integer().min(1.0).max(5.0))
        .required(
            "allowedClients",
            Schema::string()
                .min_len(1)
                .describe("Client ingress specification: comma-separated IPv4 CIDRs, hosts or ranges"),
        )
        .optional("unixReadOnly", Schema::boolean())
        .optional("unixReadWrite", Schema::boolean())
        .optional("nfsv3", Schema::boolean())
        .optional("nfsv41", Schema::boolean())
        .optional("cifs", Schema::boolean())
        .optional("hasRootAccess", Schema::boolean())
        .into()
}

fn export_policy() -> Schema {
    Schema::object()
        .required("rules", Schema::array(export_rule()).max_items(5))
        .into()
}

fn protocol_types() -> Schema {
    Schema::array(Schema::one_of(fields::PROTOCOL_TYPES))
        .min_items(1)
        .describe("Protocols the volume is exported over")
        .into()
}

fn create_body() -> ObjectSchema {
    Schema::object()
        .optional("location", fields::location())
        .required(
            "properties",
            Schema::object()
                .required("creationToken", fields::creation_token())
                .required("usageThreshold", fields::volume_size())
                .required(
                    "subnetId",
                    fields::resource_id("Delegated subnet resource ID (Microsoft.NetApp/volumes)"),
                )
                .optional("serviceLevel", fields::service_level())
                .optional("protocolTypes", protocol_types())
                .optional("networkFeatures", Schema::one_of(fields::NETWORK_FEATURES))
                .optional("exportPolicy", export_policy())
                .optional("snapshotDirectoryVisible", Schema::boolean())
                .optional("throughputMibps", fields::throughput_mibps())
                .optional(
                    "snapshotId",
                    fields::resource_id("Snapshot to create the volume from"),
                ),
        )
}

fn update_body() -> ObjectSchema {
    Schema::object().required(
        "properties",
        Schema::object()
            .optional("usageThreshold", fields::volume_size())
            .optional("serviceLevel", fields::service_level())
            .optional("exportPolicy", export_policy())
            .optional("snapshotDirectoryVisible", Schema::boolean())
            .optional("throughputMibps", fields::throughput_mibps()),
    )
}

fn resize_schema() -> ObjectSchema {
    VOLUMES.scope_schema().required("newSize", fields::volume_size())
}

fn resize_request(ctx: &InvocationContext<'_>) -> Result<Option<Value>, HandlerError> {
    let size = required_arg(ctx, "newSize")?;
    Ok(Some(json!({"properties": {"usageThreshold": size}})))
}

fn resource_id_body(field: &str, description: &str) -> ObjectSchema {
    Schema::object().required(field, fields::resource_id(description))
}

pub fn register_tools(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register_tool(VOLUMES.list_tool("List volumes in a capacity pool"))?;
    registry.register_tool(VOLUMES.get_tool("Get a volume"))?;
    registry.register_tool(VOLUMES.put_tool(
        "create_or_update",
        "Create or replace a volume (quota 100 GiB to 100 TiB, in bytes)",
        create_body(),
    ))?;
    registry.register_tool(VOLUMES.update_tool("Patch volume properties", update_body()))?;
    registry.register_tool(VOLUMES.delete_tool("Delete a volume"))?;
    registry.register_tool(VOLUMES.custom_tool(
        "resize",
        "Change a volume's quota (usageThreshold) in bytes",
        resize_schema(),
        Operation::Update,
        resize_request,
    ))?;
    registry.register_tool(VOLUMES.action_tool(
        "revert",
        "revert",
        "Revert a volume to one of its snapshots",
        Some(resource_id_body("snapshotId", "Snapshot resource ID to revert to")),
    ))?;
    registry.register_tool(VOLUMES.action_tool(
        "pool_change",
        "poolChange",
        "Move a volume to another capacity pool",
        Some(resource_id_body("newPoolResourceId", "Target capacity pool resource ID")),
    ))?;
    registry.register_tool(VOLUMES.action_tool(
        "migrate_backups",
        "migrateBackups",
        "Migrate a volume's backups to a backup vault",
        Some(resource_id_body("backupVaultId", "Destination backup vault resource ID")),
    ))?;

    let placeholders = [
        (
            "authorize_replication",
            "Authorize cross-region replication from a source volume",
            VOLUMES.scope_schema().required(
                "body",
                resource_id_body("remoteVolumeResourceId", "Destination volume resource ID"),
            ),
        ),
        (
            "break_replication",
            "Break the replication relationship of a destination volume",
            VOLUMES.scope_schema().optional(
                "body",
                Schema::object().optional("forceBreakReplication", Schema::boolean()),
            ),
        ),
        (
            "resync_replication",
            "Resync a broken replication relationship",
            VOLUMES.scope_schema(),
        ),
        (
            "delete_replication",
            "Delete the replication relationship of a destination volume",
            VOLUMES.scope_schema(),
        ),
        (
            "replication_status",
            "Get the replication status of a destination volume",
            VOLUMES.scope_schema(),
        ),
    ];
    for (operation, description, schema) in placeholders {
        registry.register_tool(VOLUMES.placeholder_tool(operation, description, schema))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties() -> Value {
        json!({
            "creationToken": "vol1",
            "usageThreshold": fields::VOLUME_MIN_BYTES,
            "subnetId": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/v/subnets/anf",
        })
    }

    #[test]
    fn test_create_minimal_volume() {
        assert!(create_body().validate(&json!({"properties": properties()})).is_ok());
    }

    #[test]
    fn test_protocol_types_must_be_known_and_non_empty() {
        let mut p = properties();
        p["protocolTypes"] = json!([]);
        assert!(create_body().validate(&json!({"properties": p.clone()})).is_err());

        p["protocolTypes"] = json!(["NFSv4.1", "SMB"]);
        let err = create_body().validate(&json!({"properties": p})).unwrap_err();
        assert_eq!(err.path, "properties.protocolTypes[1]");
    }

    #[test]
    fn test_volume_quota_bounds() {
        let mut p = properties();
        p["usageThreshold"] = json!(fields::VOLUME_MIN_BYTES - 1);
        assert!(create_body().validate(&json!({"properties": p})).is_err());
    }

    #[test]
    fn test_resize_takes_flat_size() {
        let args = json!({"accountName": "a", "poolName": "p", "volumeName": "v", "newSize": fields::VOLUME_MAX_BYTES});
        assert!(resize_schema().validate(&args).is_ok());
        let too_big = json!({"accountName": "a", "poolName": "p", "volumeName": "v", "newSize": fields::VOLUME_MAX_BYTES + 1});
        assert_eq!(resize_schema().validate(&too_big).unwrap_err().path, "newSize");
    }
}
