//! Application volume groups (SAP HANA / Oracle layouts)

use super::{ResourceKind, ACCOUNT, VOLUME_GROUP};
use crate::fields;
use crate::registry::{Registry, RegistryError};
use crate::schema::{ObjectSchema, Schema};

pub static VOLUME_GROUPS: ResourceKind = ResourceKind {
    label: "volume_groups",
    chain: &[ACCOUNT, VOLUME_GROUP],
    tracked: true,
};

fn group_volume() -> Schema {
    Schema::object()
        .required("name", fields::volume_name())
        .required(
            "properties",
            Schema::object()
                .required("creationToken", fields::creation_token())
                .required("usageThreshold", fields::volume_size())
                .required("subnetId", fields::resource_id("Delegated subnet resource ID"))
                .optional("serviceLevel", fields::service_level())
                .optional(
                    "protocolTypes",
                    Schema::array(Schema::one_of(fields::PROTOCOL_TYPES)).min_items(1),
                )
                .optional(
                    "volumeSpecName",
                    Schema::string()
                        .min_len(1)
                        .describe("Role of the volume in the application layout, e.g. data or log"),
                )
                .optional("throughputMibps", fields::throughput_mibps()),
        )
        .into()
}

fn create_body() -> ObjectSchema {
    Schema::object()
        .optional("location", fields::location())
        .required(
            "properties",
            Schema::object()
                .required(
                    "groupMetaData",
                    Schema::object()
                        .required("applicationType", Schema::one_of(fields::APPLICATION_TYPES))
                        .required("applicationIdentifier", fields::sap_sid())
                        .optional("groupDescription", Schema::string().max_len(1024)),
                )
                .required("volumes", Schema::array(group_volume()).min_items(1)),
        )
}

pub fn register_tools(registry: &mut Registry) -> Result<(), RegistryError> {
    let kind = &VOLUME_GROUPS;
    registry.register_tool(kind.list_tool("List volume groups in a NetApp account"))?;
    registry.register_tool(kind.get_tool("Get a volume group with its volumes"))?;
    registry.register_tool(kind.put_tool(
        "create",
        "Create an application volume group and all of its volumes",
        create_body(),
    ))?;
    registry.register_tool(kind.delete_tool("Delete a volume group"))?;
    Ok(())
}
