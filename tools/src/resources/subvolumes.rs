//! Subvolumes of a volume

use super::{ResourceKind, ACCOUNT, POOL, SUBVOLUME, VOLUME};
use crate::fields;
use crate::registry::{Registry, RegistryError};
use crate::schema::{ObjectSchema, Schema};

pub static SUBVOLUMES: ResourceKind = ResourceKind {
    label: "subvolumes",
    chain: &[ACCOUNT, POOL, VOLUME, SUBVOLUME],
    tracked: false,
};

fn size() -> Schema {
    Schema::integer()
        .min(0.0)
        .describe("Subvolume size in bytes")
        .into()
}

fn create_body() -> ObjectSchema {
    Schema::object().required(
        "properties",
        Schema::object()
            .required("path", fields::absolute_path("Path of the subvolume inside the volume"))
            .optional("size", size())
            .optional(
                "parentPath",
                fields::absolute_path("Existing file to clone the subvolume from"),
            ),
    )
}

fn update_body() -> ObjectSchema {
    Schema::object().required(
        "properties",
        Schema::object()
            .optional("path", fields::absolute_path("New path of the subvolume"))
            .optional("size", size()),
    )
}

pub fn register_tools(registry: &mut Registry) -> Result<(), RegistryError> {
    let kind = &SUBVOLUMES;
    registry.register_tool(kind.list_tool("List subvolumes of a volume"))?;
    registry.register_tool(kind.get_tool("Get a subvolume"))?;
    registry.register_tool(kind.put_tool("create", "Create a subvolume", create_body()))?;
    registry.register_tool(kind.update_tool("Resize or rename a subvolume", update_body()))?;
    registry.register_tool(kind.delete_tool("Delete a subvolume"))?;
    registry.register_tool(kind.action_tool(
        "get_metadata",
        "getMetadata",
        "Read a subvolume's file metadata (size, permissions, timestamps)",
        None,
    ))?;
    Ok(())
}
