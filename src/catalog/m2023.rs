// ABOUTME: TRS migrations authored in 2023
// ABOUTME: Baseline schema, the person email index and alert seed data

use super::timestamp;
use crate::error::Result;
use crate::migration::{ColumnDef, ForeignKey, IndexDef, Migration, Operation};
use crate::sql::Value;

pub(super) fn migrations() -> Result<Vec<Migration>> {
    Ok(vec![initial()?, person_email_index()?, alert_types_seed_data()?])
}

/// Baseline of the schema. Earlier routine versions were squashed into it,
/// which is why the person search procedure starts at v4.
fn initial() -> Result<Migration> {
    Ok(Migration::new("20231020100000_Initial")?
        .up(Operation::create_table(
            "persons",
            vec![
                ColumnDef::new("person_id", "uuid"),
                ColumnDef::new("trn", "character(7)").nullable(),
                ColumnDef::new("first_name", "character varying(100)"),
                ColumnDef::new("middle_name", "character varying(100)").default_sql("''"),
                ColumnDef::new("last_name", "character varying(100)"),
                ColumnDef::new("date_of_birth", "date").nullable(),
                ColumnDef::new("email_address", "character varying(100)").nullable(),
                ColumnDef::new("national_insurance_number", "character(9)").nullable(),
                timestamp("created_on"),
                timestamp("updated_on"),
                timestamp("deleted_on").nullable(),
            ],
            &["person_id"],
            vec![],
        ))
        .up(Operation::create_index(
            IndexDef::new("ix_persons_trn", "persons", &["trn"])
                .unique()
                .filter("trn IS NOT NULL"),
        ))
        .up(Operation::create_table(
            "users",
            vec![
                ColumnDef::new("user_id", "uuid"),
                ColumnDef::new("name", "character varying(200)"),
                ColumnDef::new("email", "character varying(200)").nullable(),
                ColumnDef::new("active", "boolean").default_sql("TRUE"),
                ColumnDef::new("user_type", "integer"),
                ColumnDef::new("roles", "character varying(200)[]").nullable(),
            ],
            &["user_id"],
            vec![],
        ))
        .up(Operation::create_table(
            "alert_categories",
            vec![
                ColumnDef::new("alert_category_id", "uuid"),
                ColumnDef::new("name", "character varying(200)"),
            ],
            &["alert_category_id"],
            vec![],
        ))
        .up(Operation::create_table(
            "alert_types",
            vec![
                ColumnDef::new("alert_type_id", "uuid"),
                ColumnDef::new("alert_category_id", "uuid"),
                ColumnDef::new("name", "character varying(200)"),
                ColumnDef::new("dqt_sanction_code", "character varying(5)").nullable(),
                ColumnDef::new("is_active", "boolean").default_sql("TRUE"),
            ],
            &["alert_type_id"],
            vec![ForeignKey::new(
                "fk_alert_types_alert_categories",
                "alert_category_id",
                "alert_categories",
                "alert_category_id",
            )],
        ))
        .up(Operation::create_table(
            "alerts",
            vec![
                ColumnDef::new("alert_id", "uuid"),
                ColumnDef::new("alert_type_id", "uuid"),
                ColumnDef::new("person_id", "uuid"),
                ColumnDef::new("details", "text").nullable(),
                ColumnDef::new("external_link", "text").nullable(),
                ColumnDef::new("start_date", "date").nullable(),
                ColumnDef::new("end_date", "date").nullable(),
                timestamp("created_on"),
                timestamp("updated_on"),
                timestamp("deleted_on").nullable(),
            ],
            &["alert_id"],
            vec![
                ForeignKey::new("fk_alerts_alert_types", "alert_type_id", "alert_types", "alert_type_id"),
                ForeignKey::new("fk_alerts_persons", "person_id", "persons", "person_id"),
            ],
        ))
        .up(Operation::create_table(
            "qualifications",
            vec![
                ColumnDef::new("qualification_id", "uuid"),
                ColumnDef::new("qualification_type", "integer"),
                ColumnDef::new("person_id", "uuid"),
                timestamp("created_on"),
                timestamp("updated_on"),
                timestamp("deleted_on").nullable(),
            ],
            &["qualification_id"],
            vec![ForeignKey::new(
                "fk_qualifications_persons",
                "person_id",
                "persons",
                "person_id",
            )],
        ))
        .up(Operation::create_table(
            "notes",
            vec![
                ColumnDef::new("note_id", "uuid"),
                ColumnDef::new("person_id", "uuid"),
                ColumnDef::new("content", "text").nullable(),
                ColumnDef::new("created_by_user_id", "uuid").nullable(),
                timestamp("created_on"),
            ],
            &["note_id"],
            vec![ForeignKey::new("fk_notes_persons", "person_id", "persons", "person_id").cascade()],
        ))
        .up(Operation::create_table(
            "processes",
            vec![
                ColumnDef::new("process_id", "uuid"),
                ColumnDef::new("process_type", "integer"),
                timestamp("created_on"),
                ColumnDef::new("user_id", "uuid"),
                ColumnDef::new("person_ids", "uuid[]").default_sql("'{}'"),
            ],
            &["process_id"],
            vec![],
        ))
        .up(Operation::create_table(
            "process_events",
            vec![
                ColumnDef::new("process_event_id", "uuid"),
                ColumnDef::new("process_id", "uuid"),
                ColumnDef::new("event_name", "character varying(200)"),
                ColumnDef::new("payload", "jsonb"),
                ColumnDef::new("person_ids", "uuid[]").default_sql("'{}'"),
                timestamp("created_on"),
            ],
            &["process_event_id"],
            vec![ForeignKey::new(
                "fk_process_events_processes",
                "process_id",
                "processes",
                "process_id",
            )
            .cascade()],
        ))
        .up(Operation::create_table(
            "person_search_attributes",
            vec![
                ColumnDef::new(
                    "person_search_attribute_id",
                    "bigint GENERATED BY DEFAULT AS IDENTITY",
                ),
                ColumnDef::new("person_id", "uuid"),
                ColumnDef::new("attribute_type", "character varying(50)"),
                ColumnDef::new("attribute_value", "character varying(100)"),
                ColumnDef::new("tags", "text[]"),
                ColumnDef::new("attribute_key", "character varying(50)").nullable(),
            ],
            &["person_search_attribute_id"],
            vec![ForeignKey::new(
                "fk_person_search_attributes_persons",
                "person_id",
                "persons",
                "person_id",
            )
            .cascade()],
        ))
        .up(Operation::install_routine("fn_split_names", 1))
        .up(Operation::install_routine("p_refresh_person_search_attributes", 4))
        .down(Operation::sql(
            "DROP PROCEDURE IF EXISTS p_refresh_person_search_attributes(uuid[])",
        ))
        .down(Operation::sql("DROP FUNCTION IF EXISTS fn_split_names(varchar[])"))
        .down(Operation::drop_table("person_search_attributes"))
        .down(Operation::drop_table("process_events"))
        .down(Operation::drop_table("processes"))
        .down(Operation::drop_table("notes"))
        .down(Operation::drop_table("qualifications"))
        .down(Operation::drop_table("alerts"))
        .down(Operation::drop_table("alert_types"))
        .down(Operation::drop_table("alert_categories"))
        .down(Operation::drop_table("users"))
        .down(Operation::drop_table("persons")))
}

fn person_email_index() -> Result<Migration> {
    Ok(Migration::new("20231107124000_AddPersonEmailIndex")?
        .up(Operation::create_index(IndexDef::new(
            "ix_persons_email_address",
            "persons",
            &["email_address"],
        )))
        .down(Operation::drop_index("ix_persons_email_address")))
}

const CATEGORY_EEA_DECISION: &str = "ee78d44d-abf8-44a9-b22b-87a821f8d3c9";
const CATEGORY_BARRED_LIST: &str = "0ae0707b-1503-477d-bc0f-1505ed95dbdf";
const CATEGORY_MISCONDUCT: &str = "790410c1-b884-4cdd-8db9-64a042ab54ae";

const TYPE_FAILED_INDUCTION: &str = "5562c2c6-1e24-49d4-9bb6-bcb0c7a6b21c";
const TYPE_BARRED_CHILDREN: &str = "38db7946-2dbf-408e-bc48-1625829e7dfe";
const TYPE_PROHIBITION: &str = "ed0cd700-3fb2-4db0-9403-ba57126090ed";
const TYPE_SUSPENSION: &str = "eab8b66d-68d0-4cb9-8e4d-bbd245648fb6";

fn alert_types_seed_data() -> Result<Migration> {
    let category = |id: &str, name: &str| vec![Value::from(id), Value::from(name)];
    let alert_type = |id: &str, category: &str, name: &str, code: Option<&str>| {
        vec![
            Value::from(id),
            Value::from(category),
            Value::from(name),
            Value::opt_text(code),
        ]
    };

    Ok(Migration::new("20231201093000_AlertTypesSeedData")?
        .up(Operation::insert_data(
            "alert_categories",
            &["alert_category_id", "name"],
            vec![
                category(CATEGORY_EEA_DECISION, "EEA Decision"),
                category(CATEGORY_BARRED_LIST, "Barring by the Secretary of State"),
                category(CATEGORY_MISCONDUCT, "Teacher misconduct"),
            ],
        ))
        .up(Operation::insert_data(
            "alert_types",
            &["alert_type_id", "alert_category_id", "name", "dqt_sanction_code"],
            vec![
                alert_type(
                    TYPE_FAILED_INDUCTION,
                    CATEGORY_EEA_DECISION,
                    "Failed induction",
                    Some("C1"),
                ),
                alert_type(
                    TYPE_BARRED_CHILDREN,
                    CATEGORY_BARRED_LIST,
                    "Barred from working with children",
                    Some("B1"),
                ),
                alert_type(
                    TYPE_PROHIBITION,
                    CATEGORY_MISCONDUCT,
                    "Prohibition from teaching",
                    Some("T1"),
                ),
                alert_type(
                    TYPE_SUSPENSION,
                    CATEGORY_MISCONDUCT,
                    "Interim prohibition order",
                    None,
                ),
            ],
        ))
        .down(Operation::delete_data(
            "alert_types",
            "alert_type_id",
            [
                TYPE_FAILED_INDUCTION,
                TYPE_BARRED_CHILDREN,
                TYPE_PROHIBITION,
                TYPE_SUSPENSION,
            ]
            .into_iter()
            .map(Value::from)
            .collect(),
        ))
        .down(Operation::delete_data(
            "alert_categories",
            "alert_category_id",
            [CATEGORY_EEA_DECISION, CATEGORY_BARRED_LIST, CATEGORY_MISCONDUCT]
                .into_iter()
                .map(Value::from)
                .collect(),
        )))
}
