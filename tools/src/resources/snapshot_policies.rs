//! Snapshot policies
//!
//! A policy holds up to four schedules. Each has a closed shape, so the
//! request body is rebuilt from a typed [`Schedule`] list instead of being
//! forwarded as an open map. Unset hours and minutes stay unset, so a PATCH
//! leaves the stored values alone.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{ResourceKind, ACCOUNT, SNAPSHOT_POLICY};
use crate::context::{HandlerError, InvocationContext};
use crate::fields;
use crate::handler::Operation;
use crate::registry::{Registry, RegistryError};
use crate::schema::{ObjectSchema, Schema};

pub static SNAPSHOT_POLICIES: ResourceKind = ResourceKind {
    label: "snapshot_policies",
    chain: &[ACCOUNT, SNAPSHOT_POLICY],
    tracked: true,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlySchedule {
    pub snapshots_to_keep: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minute: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySchedule {
    pub snapshots_to_keep: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minute: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySchedule {
    pub snapshots_to_keep: u32,
    /// Comma-separated weekday names
    pub day: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minute: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySchedule {
    pub snapshots_to_keep: u32,
    /// Comma-separated days of the month
    pub days_of_month: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minute: Option<u32>,
}

/// One snapshot schedule, serialized under its ARM property name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Schedule {
    #[serde(rename = "hourlySchedule")]
    Hourly(HourlySchedule),
    #[serde(rename = "dailySchedule")]
    Daily(DailySchedule),
    #[serde(rename = "weeklySchedule")]
    Weekly(WeeklySchedule),
    #[serde(rename = "monthlySchedule")]
    Monthly(MonthlySchedule),
}

pub const SCHEDULE_KEYS: [&str; 4] = [
    "hourlySchedule",
    "dailySchedule",
    "weeklySchedule",
    "monthlySchedule",
];

/// Parse the schedules present in a policy's `properties`
pub fn schedules(properties: &Map<String, Value>) -> Result<Vec<Schedule>, serde_json::Error> {
    SCHEDULE_KEYS
        .iter()
        .filter_map(|key| properties.get(*key).map(|v| (*key, v)))
        .map(|(key, v)| serde_json::from_value(json!({ key: v })))
        .collect()
}

/// ARM `properties` for a policy
pub fn policy_properties(enabled: Option<bool>, schedules: &[Schedule]) -> Result<Value, serde_json::Error> {
    let mut properties = Map::new();
    if let Some(enabled) = enabled {
        properties.insert("enabled".into(), json!(enabled));
    }
    for schedule in schedules {
        if let Value::Object(entry) = serde_json::to_value(schedule)? {
            properties.extend(entry);
        }
    }
    Ok(Value::Object(properties))
}

fn policy_request(ctx: &InvocationContext<'_>) -> Result<Option<Value>, HandlerError> {
    let mut body = ctx.body();
    let Some(props) = body.get("properties").and_then(Value::as_object) else {
        return Ok(Some(body));
    };
    let enabled = props.get("enabled").and_then(Value::as_bool);
    let parsed = schedules(props).map_err(anyhow::Error::from)?;
    body["properties"] = policy_properties(enabled, &parsed).map_err(anyhow::Error::from)?;
    Ok(Some(body))
}

fn schedule_schemas(schema: ObjectSchema) -> ObjectSchema {
    schema
        .optional(
            "hourlySchedule",
            Schema::object()
                .required("snapshotsToKeep", fields::snapshots_to_keep())
                .optional("minute", fields::minute()),
        )
        .optional(
            "dailySchedule",
            Schema::object()
                .required("snapshotsToKeep", fields::snapshots_to_keep())
                .optional("hour", fields::hour())
                .optional("minute", fields::minute()),
        )
        .optional(
            "weeklySchedule",
            Schema::object()
                .required("snapshotsToKeep", fields::snapshots_to_keep())
                .required("day", fields::weekdays())
                .optional("hour", fields::hour())
                .optional("minute", fields::minute()),
        )
        .optional(
            "monthlySchedule",
            Schema::object()
                .required("snapshotsToKeep", fields::snapshots_to_keep())
                .required("daysOfMonth", fields::days_of_month())
                .optional("hour", fields::hour())
                .optional("minute", fields::minute()),
        )
}

fn properties_schema() -> ObjectSchema {
    schedule_schemas(Schema::object().optional("enabled", Schema::boolean()))
}

fn create_body() -> ObjectSchema {
    Schema::object()
        .optional("location", fields::location())
        .required("properties", properties_schema())
}

fn update_body() -> ObjectSchema {
    Schema::object().required("properties", properties_schema())
}

pub fn register_tools(registry: &mut Registry) -> Result<(), RegistryError> {
    let kind = &SNAPSHOT_POLICIES;
    registry.register_tool(kind.list_tool("List snapshot policies in a NetApp account"))?;
    registry.register_tool(kind.get_tool("Get a snapshot policy"))?;
    registry.register_tool(kind.custom_tool(
        "create_or_update",
        "Create or replace a snapshot policy with hourly, daily, weekly and monthly schedules",
        kind.scope_schema().required("body", create_body()),
        Operation::CreateOrUpdate,
        policy_request,
    ))?;
    registry.register_tool(kind.custom_tool(
        "update",
        "Change a snapshot policy's schedules or enable/disable it",
        kind.scope_schema().required("body", update_body()),
        Operation::Update,
        policy_request,
    ))?;
    registry.register_tool(kind.delete_tool("Delete a snapshot policy"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedules_parse_into_variants() {
        let props = json!({
            "enabled": true,
            "hourlySchedule": {"snapshotsToKeep": 6, "minute": 15},
            "weeklySchedule": {"snapshotsToKeep": 4, "day": "Monday,Friday", "hour": 3}
        });
        let parsed = schedules(props.as_object().unwrap()).unwrap();
        assert_eq!(
            parsed,
            vec![
                Schedule::Hourly(HourlySchedule { snapshots_to_keep: 6, minute: Some(15) }),
                Schedule::Weekly(WeeklySchedule {
                    snapshots_to_keep: 4,
                    day: "Monday,Friday".into(),
                    hour: Some(3),
                    minute: None,
                }),
            ]
        );
    }

    #[test]
    fn test_properties_rebuilt_from_variants() {
        let schedules = vec![Schedule::Daily(DailySchedule {
            snapshots_to_keep: 7,
            hour: Some(1),
            minute: Some(30),
        })];
        assert_eq!(
            policy_properties(Some(false), &schedules).unwrap(),
            json!({
                "enabled": false,
                "dailySchedule": {"snapshotsToKeep": 7, "hour": 1, "minute": 30}
            })
        );
    }

    #[test]
    fn test_unset_schedule_fields_are_not_sent() {
        let props = json!({"dailySchedule": {"snapshotsToKeep": 9}});
        let parsed = schedules(props.as_object().unwrap()).unwrap();
        assert_eq!(
            policy_properties(None, &parsed).unwrap(),
            json!({"dailySchedule": {"snapshotsToKeep": 9}})
        );
    }

    #[test]
    fn test_schedule_fields_are_bounded() {
        let body = update_body();
        let err = body
            .validate(&json!({"properties": {"dailySchedule": {"snapshotsToKeep": 2, "hour": 24}}}))
            .unwrap_err();
        assert_eq!(err.path, "properties.dailySchedule.hour");

        let err = body
            .validate(&json!({"properties": {"monthlySchedule": {"snapshotsToKeep": 2}}}))
            .unwrap_err();
        assert_eq!(err.path, "properties.monthlySchedule.daysOfMonth");
    }
}
