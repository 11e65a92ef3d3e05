//! Volume snapshots

use super::{ResourceKind, ACCOUNT, POOL, SNAPSHOT, VOLUME};
use crate::fields;
use crate::registry::{Registry, RegistryError};
use crate::schema::{ObjectSchema, Schema};

pub static SNAPSHOTS: ResourceKind = ResourceKind {
    label: "snapshots",
    chain: &[ACCOUNT, POOL, VOLUME, SNAPSHOT],
    tracked: true,
};

fn create_body() -> ObjectSchema {
    Schema::object().optional("location", fields::location())
}

// Snapshots carry no mutable properties; a PATCH only re-asserts the region
fn update_body() -> ObjectSchema {
    Schema::object().optional("location", fields::location())
}

fn restore_files_body() -> ObjectSchema {
    Schema::object()
        .required(
            "filePaths",
            Schema::array(fields::absolute_path("Path of a file inside the snapshot"))
                .min_items(1)
                .max_items(10),
        )
        .optional(
            "destinationPath",
            fields::absolute_path("Directory in the active file system to restore into"),
        )
}

pub fn register_tools(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register_tool(SNAPSHOTS.list_tool("List snapshots of a volume"))?;
    registry.register_tool(SNAPSHOTS.get_tool("Get a snapshot"))?;
    registry.register_tool(SNAPSHOTS.put_tool(
        "create",
        "Take a snapshot of a volume",
        create_body(),
    ))?;
    registry.register_tool(SNAPSHOTS.update_tool("Update a snapshot", update_body()))?;
    registry.register_tool(SNAPSHOTS.delete_tool("Delete a snapshot"))?;
    registry.register_tool(SNAPSHOTS.action_tool(
        "restore_files",
        "restoreFiles",
        "Restore individual files from a snapshot into the volume",
        Some(restore_files_body()),
    ))?;
    Ok(())
}
