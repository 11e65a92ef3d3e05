//! Resource tool tables
//!
//! Each submodule declares one resource type: its place in the ARM hierarchy
//! (a [`ResourceKind`]), the body schemas of its mutating operations and the
//! tools it registers. Behavior lives in [`crate::handler`]; these modules are
//! data.

pub mod accounts;
pub mod backup_policies;
pub mod backup_vaults;
pub mod backups;
pub mod pools;
pub mod quota_rules;
pub mod snapshot_policies;
pub mod snapshots;
pub mod subvolumes;
pub mod volume_groups;
pub mod volumes;

use serde_json::Value;
use tracing::info;

use crate::context::{HandlerError, InvocationContext};
use crate::fields;
use crate::handler::{Operation, RequestFn, ResourceHandler};
use crate::provider::ResourcePath;
use crate::registry::{Registry, RegistryError, Tool};
use crate::schema::{ObjectSchema, Schema};

/// One level of the ARM hierarchy: type segment plus the argument naming it
pub struct Segment {
    pub kind: &'static str,
    pub arg: &'static str,
    pub field: fn() -> Schema,
}

pub const ACCOUNT: Segment = Segment {
    kind: "netAppAccounts",
    arg: "accountName",
    field: fields::account_name,
};
pub const POOL: Segment = Segment {
    kind: "capacityPools",
    arg: "poolName",
    field: fields::pool_name,
};
pub const VOLUME: Segment = Segment {
    kind: "volumes",
    arg: "volumeName",
    field: fields::volume_name,
};
pub const SNAPSHOT: Segment = Segment {
    kind: "snapshots",
    arg: "snapshotName",
    field: fields::snapshot_name,
};
pub const SNAPSHOT_POLICY: Segment = Segment {
    kind: "snapshotPolicies",
    arg: "snapshotPolicyName",
    field: fields::snapshot_policy_name,
};
pub const BACKUP_POLICY: Segment = Segment {
    kind: "backupPolicies",
    arg: "backupPolicyName",
    field: fields::backup_policy_name,
};
pub const BACKUP_VAULT: Segment = Segment {
    kind: "backupVaults",
    arg: "backupVaultName",
    field: fields::backup_vault_name,
};
pub const BACKUP: Segment = Segment {
    kind: "backups",
    arg: "backupName",
    field: fields::backup_name,
};
pub const VOLUME_GROUP: Segment = Segment {
    kind: "volumeGroups",
    arg: "volumeGroupName",
    field: fields::volume_group_name,
};
pub const SUBVOLUME: Segment = Segment {
    kind: "subvolumes",
    arg: "subvolumeName",
    field: fields::subvolume_name,
};
pub const QUOTA_RULE: Segment = Segment {
    kind: "volumeQuotaRules",
    arg: "volumeQuotaRuleName",
    field: fields::quota_rule_name,
};

/// A resource type and where it sits under the resource group
pub struct ResourceKind {
    /// `<resource>` in `anf_<resource>_<operation>`
    pub label: &'static str,
    /// Path from the account down to this resource, inclusive
    pub chain: &'static [Segment],
    /// Tracked ARM resources carry a location
    pub tracked: bool,
}

impl ResourceKind {
    pub fn tool_name(&self, operation: &str) -> String {
        format!("anf_{}_{operation}", self.label)
    }

    fn scope(segments: &[Segment]) -> ObjectSchema {
        segments.iter().fold(
            Schema::object()
                .optional("subscriptionId", fields::subscription_id())
                .optional("resourceGroupName", fields::resource_group_name()),
            |schema, seg| schema.required(seg.arg, (seg.field)()),
        )
    }

    /// Arguments naming one resource
    pub fn scope_schema(&self) -> ObjectSchema {
        Self::scope(self.chain)
    }

    /// Arguments naming the collection the resource lives in
    pub fn parent_schema(&self) -> ObjectSchema {
        Self::scope(&self.chain[..self.chain.len() - 1])
    }

    fn resolve(
        &self,
        ctx: &InvocationContext<'_>,
        segments: &[Segment],
    ) -> Result<ResourcePath, HandlerError> {
        let mut path = ResourcePath::new(ctx.subscription_id()?, ctx.resource_group()?);
        for seg in segments {
            let name = ctx
                .arg_str(seg.arg)
                .ok_or(HandlerError::MissingDefault { field: seg.arg })?;
            path = path.child(seg.kind, name);
        }
        Ok(path)
    }

    pub fn path(&self, ctx: &InvocationContext<'_>) -> Result<ResourcePath, HandlerError> {
        self.resolve(ctx, self.chain)
    }

    pub fn collection_path(&self, ctx: &InvocationContext<'_>) -> Result<ResourcePath, HandlerError> {
        let (last, parents) = self
            .chain
            .split_last()
            .ok_or(HandlerError::MissingDefault { field: "accountName" })?;
        Ok(self.resolve(ctx, parents)?.collection(last.kind))
    }

    pub fn list_tool(&'static self, description: &str) -> Tool {
        Tool::new(&self.tool_name("list"), description, self.parent_schema())
            .with_handler(ResourceHandler::new(self, Operation::List))
    }

    pub fn get_tool(&'static self, description: &str) -> Tool {
        Tool::new(&self.tool_name("get"), description, self.scope_schema())
            .with_handler(ResourceHandler::new(self, Operation::Get))
    }

    /// PUT tool named `operation` (`create` or `create_or_update`)
    pub fn put_tool(&'static self, operation: &str, description: &str, body: ObjectSchema) -> Tool {
        Tool::new(
            &self.tool_name(operation),
            description,
            self.scope_schema().required("body", body),
        )
        .with_handler(ResourceHandler::new(self, Operation::CreateOrUpdate))
    }

    /// PATCH tool
    pub fn update_tool(&'static self, description: &str, body: ObjectSchema) -> Tool {
        Tool::new(
            &self.tool_name("update"),
            description,
            self.scope_schema().required("body", body),
        )
        .with_handler(ResourceHandler::new(self, Operation::Update))
    }

    pub fn delete_tool(&'static self, description: &str) -> Tool {
        Tool::new(&self.tool_name("delete"), description, self.scope_schema())
            .with_handler(ResourceHandler::new(self, Operation::Delete))
    }

    /// POST `<resource>/<action>` tool; `body` becomes a required argument when given
    pub fn action_tool(
        &'static self,
        operation: &str,
        action: &'static str,
        description: &str,
        body: Option<ObjectSchema>,
    ) -> Tool {
        let schema = match body {
            Some(body) => self.scope_schema().required("body", body),
            None => self.scope_schema(),
        };
        Tool::new(&self.tool_name(operation), description, schema)
            .with_handler(ResourceHandler::new(self, Operation::Action(action)))
    }

    /// Tool with a handler that builds its own payload from flat arguments
    pub fn custom_tool(
        &'static self,
        operation: &str,
        description: &str,
        schema: ObjectSchema,
        kind: Operation,
        request: RequestFn,
    ) -> Tool {
        Tool::new(&self.tool_name(operation), description, schema)
            .with_handler(ResourceHandler::new(self, kind).with_request(request))
    }

    /// Registered contract without a handler
    pub fn placeholder_tool(&self, operation: &str, description: &str, schema: ObjectSchema) -> Tool {
        Tool::new(&self.tool_name(operation), description, schema)
    }
}

/// Read a required argument that the schema has already checked
pub fn required_arg<'c>(ctx: &'c InvocationContext<'_>, name: &'static str) -> Result<&'c Value, HandlerError> {
    ctx.args
        .get(name)
        .ok_or(HandlerError::MissingDefault { field: name })
}

/// Registry with every NetApp tool
pub fn build_registry() -> Result<Registry, RegistryError> {
    let mut registry = Registry::new();
    accounts::register_tools(&mut registry)?;
    pools::register_tools(&mut registry)?;
    volumes::register_tools(&mut registry)?;
    snapshots::register_tools(&mut registry)?;
    snapshot_policies::register_tools(&mut registry)?;
    backup_policies::register_tools(&mut registry)?;
    backup_vaults::register_tools(&mut registry)?;
    backups::register_tools(&mut registry)?;
    volume_groups::register_tools(&mut registry)?;
    subvolumes::register_tools(&mut registry)?;
    quota_rules::register_tools(&mut registry)?;
    info!(
        "Registered {} tools ({} placeholders)",
        registry.tool_count(),
        registry.placeholder_count()
    );
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    static POOLS: ResourceKind = ResourceKind {
        label: "pools",
        chain: &[ACCOUNT, POOL],
        tracked: true,
    };

    #[test]
    fn test_scope_schema_lists_chain_in_order() {
        let schema = POOLS.scope_schema();
        let names: Vec<_> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["subscriptionId", "resourceGroupName", "accountName", "poolName"]
        );
        assert_eq!(schema.required_fields(), vec!["accountName", "poolName"]);
    }

    #[test]
    fn test_parent_schema_drops_last_segment() {
        assert_eq!(POOLS.parent_schema().required_fields(), vec!["accountName"]);
    }

    #[test]
    fn test_tool_names() {
        assert_eq!(POOLS.tool_name("create_or_update"), "anf_pools_create_or_update");
        assert_eq!(POOLS.list_tool("").name, "anf_pools_list");
    }

    #[test]
    fn test_full_registry_builds_without_duplicates() {
        let registry = build_registry().unwrap();
        assert!(registry.tool_count() > 60);
        assert_eq!(registry.placeholder_count(), 5);
        for tool in registry.list_tools() {
            assert!(tool.name.starts_with("anf_"), "{}", tool.name);
            assert!(!tool.description.is_empty(), "{}", tool.name);
        }
    }
}
