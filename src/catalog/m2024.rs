// ABOUTME: TRS migrations authored in 2024
// ABOUTME: Column changes, search indexes, the reporting publication and routine upgrades

use super::{timestamp, REPORTING_PUBLICATION};
use crate::error::Result;
use crate::migration::{ColumnDef, IndexDef, Migration, Operation};
use crate::sql::Value;

pub(super) fn migrations() -> Result<Vec<Migration>> {
    Ok(vec![
        note_content_html()?,
        mandatory_qualifications()?,
        split_names_v2()?,
        person_search_attribute_indexes()?,
        user_azure_ad_id()?,
        reporting_publication()?,
        alerts_reporting_publication()?,
        refresh_person_search_attributes_v5()?,
        split_names_v3()?,
        process_event_person_ids_index()?,
        resolve_record_by_trn()?,
        person_status()?,
        notes_reporting_publication()?,
    ])
}

// CALL rejects subqueries in its arguments, so the ids are collected in a DO block.
pub(super) const REFRESH_ALL_PERSONS: &str = "DO $$\n\
     DECLARE ids uuid[] := ARRAY(SELECT person_id FROM persons);\n\
     BEGIN\n    \
     CALL p_refresh_person_search_attributes(ids);\n\
     END\n\
     $$";

fn note_content_html() -> Result<Migration> {
    Ok(Migration::new("20240112110000_NoteContentHtml")?
        .up(Operation::rename_column("notes", "content", "content_html"))
        .up(Operation::add_column(
            "notes",
            ColumnDef::new("original_file_name", "character varying(500)").nullable(),
        ))
        .down(Operation::drop_column("notes", "original_file_name"))
        .down(Operation::rename_column("notes", "content_html", "content")))
}

fn mandatory_qualifications() -> Result<Migration> {
    Ok(Migration::new("20240205150000_MandatoryQualifications")?
        .up(Operation::add_column(
            "qualifications",
            ColumnDef::new("mq_provider_id", "uuid").nullable(),
        ))
        .up(Operation::add_column(
            "qualifications",
            ColumnDef::new("mq_specialism", "integer").nullable(),
        ))
        .up(Operation::add_column(
            "qualifications",
            ColumnDef::new("mq_status", "integer").nullable(),
        ))
        .up(Operation::add_column(
            "qualifications",
            ColumnDef::new("start_date", "date").nullable(),
        ))
        .up(Operation::add_column(
            "qualifications",
            ColumnDef::new("end_date", "date").nullable(),
        ))
        .up(Operation::create_index(IndexDef::new(
            "ix_qualifications_person_id",
            "qualifications",
            &["person_id"],
        )))
        .down(Operation::drop_index("ix_qualifications_person_id"))
        .down(Operation::drop_column("qualifications", "end_date"))
        .down(Operation::drop_column("qualifications", "start_date"))
        .down(Operation::drop_column("qualifications", "mq_status"))
        .down(Operation::drop_column("qualifications", "mq_specialism"))
        .down(Operation::drop_column("qualifications", "mq_provider_id")))
}

fn split_names_v2() -> Result<Migration> {
    Migration::new("20240301101500_SplitNamesV2")?.replace_routine("fn_split_names", 2)
}

fn person_search_attribute_indexes() -> Result<Migration> {
    Ok(Migration::new("20240318120000_PersonSearchAttributeIndexes")?
        .up(Operation::create_index(IndexDef::new(
            "ix_person_search_attributes_attribute_type_and_value",
            "person_search_attributes",
            &["attribute_type", "attribute_value"],
        )))
        .up(Operation::create_index(IndexDef::new(
            "ix_person_search_attributes_person_id",
            "person_search_attributes",
            &["person_id"],
        )))
        .up(Operation::sql(REFRESH_ALL_PERSONS))
        .down(Operation::drop_index("ix_person_search_attributes_person_id"))
        .down(Operation::drop_index(
            "ix_person_search_attributes_attribute_type_and_value",
        )))
}

fn user_azure_ad_id() -> Result<Migration> {
    Ok(Migration::new("20240410090000_UserAzureAdId")?
        .up(Operation::add_column(
            "users",
            ColumnDef::new("azure_ad_user_id", "character varying(100)").nullable(),
        ))
        .up(Operation::create_index(
            IndexDef::new("ix_users_azure_ad_user_id", "users", &["azure_ad_user_id"])
                .unique()
                .filter("azure_ad_user_id IS NOT NULL"),
        ))
        .up(Operation::update_data(
            "users",
            vec![("roles", Value::raw("'{}'::character varying(200)[]"))],
            "roles IS NULL",
        ))
        .up(Operation::alter_default("users", "roles", Some("'{}'")))
        .up(Operation::alter_nullability("users", "roles", false))
        .down(Operation::alter_nullability("users", "roles", true))
        .down(Operation::alter_default("users", "roles", None))
        .down(Operation::drop_index("ix_users_azure_ad_user_id"))
        .down(Operation::drop_column("users", "azure_ad_user_id")))
}

fn reporting_publication() -> Result<Migration> {
    Ok(Migration::new("20240502140000_ReportingPublication")?
        .up(Operation::create_publication(
            REPORTING_PUBLICATION,
            &["persons", "qualifications"],
        ))
        .down(Operation::drop_publication(REPORTING_PUBLICATION)))
}

fn alerts_reporting_publication() -> Result<Migration> {
    let tables = ["alerts", "alert_types", "alert_categories"];
    Ok(Migration::new("20240520110000_AlertsReportingPublication")?
        .up(Operation::add_to_publication(REPORTING_PUBLICATION, &tables))
        .down(Operation::drop_from_publication(REPORTING_PUBLICATION, &tables)))
}

fn refresh_person_search_attributes_v5() -> Result<Migration> {
    Ok(Migration::new("20240611093000_RefreshPersonSearchAttributesV5")?
        .replace_routine("p_refresh_person_search_attributes", 5)?
        .up(Operation::sql(REFRESH_ALL_PERSONS))
        .down(Operation::sql(REFRESH_ALL_PERSONS)))
}

fn split_names_v3() -> Result<Migration> {
    Migration::new("20240702100000_SplitNamesV3")?.replace_routine("fn_split_names", 3)
}

fn process_event_person_ids_index() -> Result<Migration> {
    Ok(Migration::new("20240815120000_ProcessEventPersonIdsIndex")?
        .non_transactional()
        .up(Operation::create_index(
            IndexDef::new(
                "ix_process_events_person_ids",
                "process_events",
                &["person_ids"],
            )
            .gin()
            .concurrently(),
        ))
        .down(Operation::drop_index_concurrently(
            "ix_process_events_person_ids",
        )))
}

fn resolve_record_by_trn() -> Result<Migration> {
    Ok(Migration::new("20240910091500_ResolveRecordByTrn")?
        .up(Operation::add_column(
            "persons",
            ColumnDef::new("merged_with_person_id", "uuid").nullable(),
        ))
        .up(Operation::add_column("persons", timestamp("merged_on").nullable()))
        .up(Operation::install_routine("fn_resolve_record_by_trn", 1))
        .down(Operation::sql(
            "DROP FUNCTION IF EXISTS fn_resolve_record_by_trn(character)",
        ))
        .down(Operation::drop_column("persons", "merged_on"))
        .down(Operation::drop_column("persons", "merged_with_person_id")))
}

fn person_status() -> Result<Migration> {
    Ok(Migration::new("20241014160000_PersonStatus")?
        .up(Operation::add_column(
            "persons",
            ColumnDef::new("status", "integer").default_sql("0"),
        ))
        .up(Operation::update_data(
            "persons",
            vec![("status", Value::Int(1))],
            "merged_with_person_id IS NOT NULL",
        ))
        .down(Operation::drop_column("persons", "status")))
}

fn notes_reporting_publication() -> Result<Migration> {
    let tables = ["notes", "users"];
    Ok(Migration::new("20241105100000_NotesReportingPublication")?
        .up(Operation::add_to_publication(REPORTING_PUBLICATION, &tables))
        .down(Operation::drop_from_publication(REPORTING_PUBLICATION, &tables)))
}
