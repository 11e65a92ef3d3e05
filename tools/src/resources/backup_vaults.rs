//! Backup vaults

use super::{ResourceKind, ACCOUNT, BACKUP_VAULT};
use crate::fields;
use crate::registry::{Registry, RegistryError};
use crate::schema::Schema;

pub static BACKUP_VAULTS: ResourceKind = ResourceKind {
    label: "backup_vaults",
    chain: &[ACCOUNT, BACKUP_VAULT],
    tracked: true,
};

pub fn register_tools(registry: &mut Registry) -> Result<(), RegistryError> {
    let kind = &BACKUP_VAULTS;
    registry.register_tool(kind.list_tool("List backup vaults in a NetApp account"))?;
    registry.register_tool(kind.get_tool("Get a backup vault"))?;
    registry.register_tool(kind.put_tool(
        "create_or_update",
        "Create or replace a backup vault",
        Schema::object().optional("location", fields::location()),
    ))?;
    registry.register_tool(kind.update_tool(
        "Update a backup vault",
        Schema::object().optional("location", fields::location()),
    ))?;
    registry.register_tool(kind.delete_tool("Delete a backup vault and its backups"))?;
    Ok(())
}
