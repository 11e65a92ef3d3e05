//! Backups held in a backup vault

use super::{ResourceKind, ACCOUNT, BACKUP, BACKUP_VAULT};
use crate::fields;
use crate::registry::{Registry, RegistryError};
use crate::schema::{ObjectSchema, Schema};

pub static BACKUPS: ResourceKind = ResourceKind {
    label: "backups",
    chain: &[ACCOUNT, BACKUP_VAULT, BACKUP],
    tracked: false,
};

fn create_body() -> ObjectSchema {
    Schema::object().required(
        "properties",
        Schema::object()
            .required("volumeResourceId", fields::resource_id("Volume to back up"))
            .optional(
                "label",
                Schema::string().max_len(1024).describe("Free-form backup label"),
            )
            .optional(
                "useExistingSnapshot",
                Schema::boolean().describe("Back up the volume's latest snapshot instead of taking a new one"),
            )
            .optional("snapshotName", fields::snapshot_name()),
    )
}

pub fn register_tools(registry: &mut Registry) -> Result<(), RegistryError> {
    let kind = &BACKUPS;
    registry.register_tool(kind.list_tool("List backups in a backup vault"))?;
    registry.register_tool(kind.get_tool("Get a backup"))?;
    registry.register_tool(kind.put_tool(
        "create",
        "Create a manual backup of a volume in a backup vault",
        create_body(),
    ))?;
    registry.register_tool(kind.delete_tool("Delete a backup"))?;
    Ok(())
}
