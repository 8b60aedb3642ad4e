// ABOUTME: TRS migrations authored in 2025
// ABOUTME: System user seed row and process event clean-up

use super::SYSTEM_USER_ID;
use crate::error::Result;
use crate::migration::{ColumnDef, Migration, Operation};
use crate::sql::Value;

pub(super) fn migrations() -> Result<Vec<Migration>> {
    Ok(vec![
        system_user()?,
        process_event_type()?,
        drop_qualification_mq_status()?,
    ])
}

fn system_user() -> Result<Migration> {
    Ok(Migration::new("20250115103000_SystemUser")?
        .up(Operation::insert_data(
            "users",
            &["user_id", "name", "active", "user_type", "roles"],
            vec![vec![
                Value::from(SYSTEM_USER_ID),
                Value::from("System"),
                Value::Bool(true),
                Value::Int(2),
                Value::raw("ARRAY['Administrator']::character varying(200)[]"),
            ]],
        ))
        .down(Operation::delete_data(
            "users",
            "user_id",
            vec![Value::from(SYSTEM_USER_ID)],
        )))
}

fn process_event_type() -> Result<Migration> {
    Ok(Migration::new("20250210120000_ProcessEventType")?
        .up(Operation::rename_column(
            "process_events",
            "event_name",
            "event_type",
        ))
        .down(Operation::rename_column(
            "process_events",
            "event_type",
            "event_name",
        )))
}

fn drop_qualification_mq_status() -> Result<Migration> {
    Ok(Migration::new("20250304090000_DropQualificationMqStatus")?
        .up(Operation::drop_column("qualifications", "mq_status"))
        .down(Operation::add_column(
            "qualifications",
            ColumnDef::new("mq_status", "integer").nullable(),
        )))
}
