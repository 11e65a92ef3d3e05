//! Backup policies

use super::{ResourceKind, ACCOUNT, BACKUP_POLICY};
use crate::fields;
use crate::registry::{Registry, RegistryError};
use crate::schema::{ObjectSchema, Schema};

pub static BACKUP_POLICIES: ResourceKind = ResourceKind {
    label: "backup_policies",
    chain: &[ACCOUNT, BACKUP_POLICY],
    tracked: true,
};

fn retention(min: f64, description: &str) -> Schema {
    Schema::integer().min(min).max(1019.0).describe(description).into()
}

fn properties_schema() -> ObjectSchema {
    Schema::object()
        .optional("enabled", Schema::boolean())
        .optional("dailyBackupsToKeep", retention(2.0, "Daily backups to retain"))
        .optional("weeklyBackupsToKeep", retention(1.0, "Weekly backups to retain"))
        .optional("monthlyBackupsToKeep", retention(1.0, "Monthly backups to retain"))
}

pub fn register_tools(registry: &mut Registry) -> Result<(), RegistryError> {
    let kind = &BACKUP_POLICIES;
    registry.register_tool(kind.list_tool("List backup policies in a NetApp account"))?;
    registry.register_tool(kind.get_tool("Get a backup policy"))?;
    registry.register_tool(kind.put_tool(
        "create_or_update",
        "Create or replace a backup policy",
        Schema::object()
            .optional("location", fields::location())
            .required("properties", properties_schema()),
    ))?;
    registry.register_tool(kind.update_tool(
        "Change a backup policy's retention or enable/disable it",
        Schema::object().required("properties", properties_schema()),
    ))?;
    registry.register_tool(kind.delete_tool("Delete a backup policy"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_daily_retention_minimum_is_two() {
        let p = properties_schema();
        assert!(p.validate(&json!({"dailyBackupsToKeep": 2})).is_ok());
        assert!(p.validate(&json!({"dailyBackupsToKeep": 1})).is_err());
        assert!(p.validate(&json!({"weeklyBackupsToKeep": 1})).is_ok());
        assert!(p.validate(&json!({"monthlyBackupsToKeep": 1020})).is_err());
    }
}
