//! NetApp accounts

use super::{ResourceKind, ACCOUNT};
use crate::fields;
use crate::registry::{Registry, RegistryError};
use crate::schema::{ObjectSchema, Schema};

pub static ACCOUNTS: ResourceKind = ResourceKind {
    label: "accounts",
    chain: &[ACCOUNT],
    tracked: true,
};

fn active_directory() -> Schema {
    Schema::object()
        .required("username", Schema::string().min_len(1).max_len(255))
        .required("password", Schema::string().min_len(1).max_len(64))
        .required("domain", Schema::string().min_len(1).max_len(255))
        .required(
            "dns",
            Schema::string()
                .min_len(1)
                .describe("Comma-separated DNS server IP addresses"),
        )
        .required(
            "smbServerName",
            Schema::string()
                .min_len(1)
                .max_len(10)
                .describe("NetBIOS name prefix of the SMB server"),
        )
        .optional("organizationalUnit", Schema::string().min_len(1))
        .optional("site", Schema::string().min_len(1))
        .describe("Active Directory connection used by SMB volumes")
        .into()
}

fn account_properties() -> ObjectSchema {
    Schema::object().optional(
        "activeDirectories",
        Schema::array(active_directory()).max_items(1),
    )
}

fn create_body() -> ObjectSchema {
    Schema::object()
        .optional("location", fields::location())
        .optional("properties", account_properties())
}

fn update_body() -> ObjectSchema {
    Schema::object().required("properties", account_properties())
}

pub fn register_tools(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register_tool(ACCOUNTS.list_tool("List NetApp accounts in a resource group"))?;
    registry.register_tool(ACCOUNTS.get_tool("Get a NetApp account"))?;
    registry.register_tool(ACCOUNTS.put_tool(
        "create_or_update",
        "Create or replace a NetApp account",
        create_body(),
    ))?;
    registry.register_tool(ACCOUNTS.update_tool(
        "Update a NetApp account's Active Directory connection",
        update_body(),
    ))?;
    registry.register_tool(ACCOUNTS.delete_tool("Delete a NetApp account"))?;
    Ok(())
}
