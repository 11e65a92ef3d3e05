//! Shared field constraints for NetApp resources
//!
//! Every resource module builds its operation schemas from these constructors
//! so a given field (`accountName`, `location`, pool `size`) carries the same
//! constraint wherever it appears.

use std::sync::LazyLock;

use regex::Regex;

use crate::schema::Schema;

pub const GIB: i64 = 1024 * 1024 * 1024;
pub const TIB: i64 = 1024 * GIB;

/// Capacity pool size bounds, in bytes
pub const POOL_MIN_BYTES: i64 = 4 * TIB;
pub const POOL_MAX_BYTES: i64 = 500 * TIB;

/// Volume quota (`usageThreshold`) bounds, in bytes
pub const VOLUME_MIN_BYTES: i64 = 100 * GIB;
pub const VOLUME_MAX_BYTES: i64 = 100 * TIB;

pub const SERVICE_LEVELS: &[&str] = &["Standard", "Premium", "Ultra", "StandardZRS"];
pub const QOS_TYPES: &[&str] = &["Auto", "Manual"];
pub const PROTOCOL_TYPES: &[&str] = &["NFSv3", "NFSv4.1", "CIFS"];
pub const NETWORK_FEATURES: &[&str] = &["Basic", "Standard"];
pub const QUOTA_TYPES: &[&str] = &[
    "DefaultUserQuota",
    "DefaultGroupQuota",
    "IndividualUserQuota",
    "IndividualGroupQuota",
];
pub const APPLICATION_TYPES: &[&str] = &["SAP-HANA", "ORACLE"];

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($re).expect(concat!("invalid pattern ", stringify!($name))));
    };
}

pattern!(RESOURCE_NAME, r"^[a-zA-Z][a-zA-Z0-9_-]*$");
pattern!(
    SUBSCRIPTION_ID,
    r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$"
);
pattern!(RESOURCE_GROUP, r"^[-a-zA-Z0-9_.()]+$");
pattern!(LOCATION, r"^[a-z0-9]+$");
pattern!(ARM_RESOURCE_ID, r"^/subscriptions/[^/]+/resourceGroups/[^/]+/providers/.+$");
pattern!(CREATION_TOKEN, r"^[a-zA-Z][a-zA-Z0-9-]*$");
pattern!(ABSOLUTE_PATH, r"^/.*$");
pattern!(SAP_SID, r"^[A-Z][A-Z0-9]{2}$");
pattern!(
    WEEKDAYS,
    r"^(Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday)(,(Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday))*$"
);
pattern!(
    DAYS_OF_MONTH,
    r"^([1-9]|[12][0-9]|3[01])(,([1-9]|[12][0-9]|3[01]))*$"
);

pub fn subscription_id() -> Schema {
    Schema::string()
        .pattern(&SUBSCRIPTION_ID)
        .describe("Azure subscription ID (UUID); defaults to the configured subscription")
        .into()
}

pub fn resource_group_name() -> Schema {
    Schema::string()
        .min_len(1)
        .max_len(90)
        .pattern(&RESOURCE_GROUP)
        .describe("Resource group name; defaults to the configured resource group")
        .into()
}

pub fn location() -> Schema {
    Schema::string()
        .min_len(1)
        .max_len(50)
        .pattern(&LOCATION)
        .describe("Azure region, e.g. eastus; defaults to the configured location")
        .into()
}

fn resource_name(description: &str, max: usize) -> Schema {
    Schema::string()
        .min_len(1)
        .max_len(max)
        .pattern(&RESOURCE_NAME)
        .describe(description)
        .into()
}

pub fn account_name() -> Schema {
    resource_name("NetApp account name", 128)
}

pub fn pool_name() -> Schema {
    resource_name("Capacity pool name", 64)
}

pub fn volume_name() -> Schema {
    resource_name("Volume name", 64)
}

pub fn snapshot_name() -> Schema {
    resource_name("Snapshot name", 255)
}

pub fn snapshot_policy_name() -> Schema {
    resource_name("Snapshot policy name", 64)
}

pub fn backup_policy_name() -> Schema {
    resource_name("Backup policy name", 64)
}

pub fn backup_vault_name() -> Schema {
    resource_name("Backup vault name", 64)
}

pub fn backup_name() -> Schema {
    resource_name("Backup name", 64)
}

pub fn volume_group_name() -> Schema {
    resource_name("Volume group name", 64)
}

pub fn subvolume_name() -> Schema {
    resource_name("Subvolume name", 64)
}

pub fn quota_rule_name() -> Schema {
    resource_name("Volume quota rule name", 64)
}

pub fn resource_id(description: &str) -> Schema {
    Schema::string()
        .min_len(1)
        .pattern(&ARM_RESOURCE_ID)
        .describe(description)
        .into()
}

pub fn absolute_path(description: &str) -> Schema {
    Schema::string()
        .min_len(1)
        .max_len(1024)
        .pattern(&ABSOLUTE_PATH)
        .describe(description)
        .into()
}

pub fn creation_token() -> Schema {
    Schema::string()
        .min_len(1)
        .max_len(80)
        .pattern(&CREATION_TOKEN)
        .describe("Unique file path (export name) for the volume")
        .into()
}

pub fn sap_sid() -> Schema {
    Schema::string()
        .pattern(&SAP_SID)
        .describe("Application identifier, e.g. the SAP system ID")
        .into()
}

pub fn weekdays() -> Schema {
    Schema::string()
        .pattern(&WEEKDAYS)
        .describe("Comma-separated weekdays, e.g. Monday,Thursday")
        .into()
}

pub fn days_of_month() -> Schema {
    Schema::string()
        .pattern(&DAYS_OF_MONTH)
        .describe("Comma-separated days of the month, e.g. 1,15")
        .into()
}

pub fn service_level() -> Schema {
    Schema::one_of(SERVICE_LEVELS)
        .describe("Service level of the capacity pool")
        .into()
}

pub fn qos_type() -> Schema {
    Schema::one_of(QOS_TYPES).describe("QoS type of the pool").into()
}

pub fn pool_size() -> Schema {
    Schema::integer()
        .min(POOL_MIN_BYTES as f64)
        .max(POOL_MAX_BYTES as f64)
        .describe("Provisioned pool size in bytes (4 TiB to 500 TiB)")
        .into()
}

pub fn volume_size() -> Schema {
    Schema::integer()
        .min(VOLUME_MIN_BYTES as f64)
        .max(VOLUME_MAX_BYTES as f64)
        .describe("Volume quota in bytes (100 GiB to 100 TiB)")
        .into()
}

pub fn throughput_mibps() -> Schema {
    Schema::number()
        .min(0.0)
        .describe("Throughput limit in MiB/s for manual QoS pools")
        .into()
}

pub fn hour() -> Schema {
    Schema::integer().min(0.0).max(23.0).into()
}

pub fn minute() -> Schema {
    Schema::integer().min(0.0).max(59.0).into()
}

pub fn snapshots_to_keep() -> Schema {
    Schema::integer()
        .min(0.0)
        .max(255.0)
        .describe("Number of snapshots to retain")
        .into()
}
