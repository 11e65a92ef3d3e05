//! Volume quota rules

use super::{ResourceKind, ACCOUNT, POOL, QUOTA_RULE, VOLUME};
use crate::fields;
use crate::registry::{Registry, RegistryError};
use crate::schema::{ObjectSchema, Schema};

pub static QUOTA_RULES: ResourceKind = ResourceKind {
    label: "quota_rules",
    chain: &[ACCOUNT, POOL, VOLUME, QUOTA_RULE],
    tracked: true,
};

fn quota_size() -> Schema {
    Schema::integer()
        .min(4.0)
        .describe("Quota limit in KiB")
        .into()
}

fn create_body() -> ObjectSchema {
    Schema::object()
        .optional("location", fields::location())
        .required(
            "properties",
            Schema::object()
                .required("quotaType", Schema::one_of(fields::QUOTA_TYPES))
                .required("quotaSizeInKiBs", quota_size())
                .optional(
                    "quotaTarget",
                    Schema::string()
                        .min_len(1)
                        .describe("UID, GID or SID the rule applies to; omitted for default quotas"),
                ),
        )
}

fn update_body() -> ObjectSchema {
    Schema::object().required(
        "properties",
        Schema::object().required("quotaSizeInKiBs", quota_size()),
    )
}

pub fn register_tools(registry: &mut Registry) -> Result<(), RegistryError> {
    let kind = &QUOTA_RULES;
    registry.register_tool(kind.list_tool("List quota rules of a volume"))?;
    registry.register_tool(kind.get_tool("Get a volume quota rule"))?;
    registry.register_tool(kind.put_tool(
        "create",
        "Create a user or group quota rule on a volume",
        create_body(),
    ))?;
    registry.register_tool(kind.update_tool("Change a quota rule's limit", update_body()))?;
    registry.register_tool(kind.delete_tool("Delete a volume quota rule"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quota_type_and_minimum_size() {
        let ok = json!({"properties": {"quotaType": "IndividualUserQuota", "quotaSizeInKiBs": 4, "quotaTarget": "1001"}});
        assert!(create_body().validate(&ok).is_ok());

        let small = json!({"properties": {"quotaType": "DefaultUserQuota", "quotaSizeInKiBs": 3}});
        assert_eq!(
            create_body().validate(&small).unwrap_err().path,
            "properties.quotaSizeInKiBs"
        );

        let bad_type = json!({"properties": {"quotaType": "TeamQuota", "quotaSizeInKiBs": 8}});
        assert!(create_body().validate(&bad_type).is_err());
    }
}
