// ABOUTME: The ordered Teaching Record System migration catalog
// ABOUTME: Validation here guards the invariants every runner relies on

mod m2023;
mod m2024;
mod m2025;

use crate::error::{MigratorError, Result};
use crate::migration::{ColumnDef, Migration};
use crate::scripts::ScriptSource;

/// Publication the reporting database subscribes to.
pub const REPORTING_PUBLICATION: &str = "trs_rep_sync";

/// Well-known id of the user that records changes made by the system itself.
pub const SYSTEM_USER_ID: &str = "a81394d1-a498-46d8-af3e-e077596ab303";

/// Every TRS migration, oldest first.
pub fn migrations() -> Result<Vec<Migration>> {
    let mut all = m2023::migrations()?;
    all.extend(m2024::migrations()?);
    all.extend(m2025::migrations()?);
    Ok(all)
}

/// Checks ordering, reversibility, transaction compatibility and routine availability.
pub fn validate(migrations: &[Migration], scripts: &dyn ScriptSource) -> Result<()> {
    for pair in migrations.windows(2) {
        if pair[0].id >= pair[1].id {
            return Err(MigratorError::Validation(format!(
                "migrations must be strictly ordered, but '{}' is followed by '{}'",
                pair[0].id, pair[1].id
            )));
        }
    }

    for migration in migrations {
        if migration.up.is_empty() {
            return Err(MigratorError::Validation(format!(
                "'{}' has no up operations",
                migration.id
            )));
        }

        if !migration.irreversible && migration.down.is_empty() {
            return Err(MigratorError::Validation(format!(
                "'{}' has no down operations; mark it irreversible if that is intended",
                migration.id
            )));
        }

        if migration.transactional && migration.has_concurrent_operations() {
            return Err(MigratorError::Validation(format!(
                "'{}' uses CONCURRENTLY and must be marked non-transactional",
                migration.id
            )));
        }

        for routine in migration.routines() {
            if !scripts.contains(&routine.file_name()) {
                return Err(MigratorError::Script(format!(
                    "'{}' references {}, which the script source cannot find",
                    migration.id, routine
                )));
            }
        }
    }

    tracing::debug!("Validated {} migration(s)", migrations.len());
    Ok(())
}

pub(crate) fn timestamp(name: &str) -> ColumnDef {
    ColumnDef::new(name, "timestamp with time zone")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::{IndexDef, Operation};
    use crate::scripts::EmbeddedScripts;

    #[test]
    fn test_catalog_is_valid() {
        let all = migrations().unwrap();
        validate(&all, &EmbeddedScripts).unwrap();
        assert_eq!(all[0].id.name(), "Initial");
    }

    #[test]
    fn test_catalog_renders_in_both_directions() {
        for migration in migrations().unwrap() {
            migration.render_up(&EmbeddedScripts).unwrap();
            migration.render_down(&EmbeddedScripts).unwrap();
        }
    }

    #[test]
    fn test_routine_replacements_reinstall_previous_version() {
        let all = migrations().unwrap();
        let v5 = all
            .iter()
            .find(|m| m.id.name() == "RefreshPersonSearchAttributesV5")
            .unwrap();
        let down: Vec<String> = v5.routines().map(|r| r.file_name()).collect();
        assert_eq!(
            down,
            vec![
                "p_refresh_person_search_attributes_v5.sql",
                "p_refresh_person_search_attributes_v4.sql"
            ]
        );
    }

    #[test]
    fn test_no_call_takes_a_subquery_argument() {
        for migration in migrations().unwrap() {
            let statements = migration
                .render_up(&EmbeddedScripts)
                .unwrap()
                .into_iter()
                .chain(migration.render_down(&EmbeddedScripts).unwrap());
            for statement in statements {
                if statement.trim_start().to_uppercase().starts_with("CALL") {
                    assert!(
                        !statement.to_uppercase().contains("SELECT"),
                        "{}: {}",
                        migration.id,
                        statement
                    );
                }
            }
        }
    }

    #[test]
    fn test_person_search_refresh_runs_in_do_block() {
        assert!(m2024::REFRESH_ALL_PERSONS.starts_with("DO $$\n"));
        assert!(m2024::REFRESH_ALL_PERSONS.ends_with("\n$$"));
        assert!(m2024::REFRESH_ALL_PERSONS
            .contains("    CALL p_refresh_person_search_attributes(ids);\n"));

        let all = migrations().unwrap();
        for name in [
            "PersonSearchAttributeIndexes",
            "RefreshPersonSearchAttributesV5",
        ] {
            let migration = all.iter().find(|m| m.id.name() == name).unwrap();
            let up = migration.render_up(&EmbeddedScripts).unwrap();
            assert_eq!(up.last().map(String::as_str), Some(m2024::REFRESH_ALL_PERSONS));
        }
    }

    #[test]
    fn test_validate_rejects_unordered() {
        let a = Migration::new("20240102000000_B")
            .unwrap()
            .up(Operation::sql("SELECT 1"))
            .down(Operation::sql("SELECT 1"));
        let b = Migration::new("20240101000000_A")
            .unwrap()
            .up(Operation::sql("SELECT 1"))
            .down(Operation::sql("SELECT 1"));
        assert!(validate(&[a.clone(), b], &EmbeddedScripts).is_err());
        assert!(validate(&[a.clone(), a], &EmbeddedScripts).is_err());
    }

    #[test]
    fn test_validate_requires_down_unless_irreversible() {
        let m = Migration::new("20240101000000_A")
            .unwrap()
            .up(Operation::sql("SELECT 1"));
        assert!(validate(&[m.clone()], &EmbeddedScripts).is_err());
        assert!(validate(&[m.irreversible()], &EmbeddedScripts).is_ok());
    }

    #[test]
    fn test_validate_concurrent_index_needs_non_transactional() {
        let m = Migration::new("20240101000000_Idx")
            .unwrap()
            .up(Operation::create_index(
                IndexDef::new("ix_a", "a", &["b"]).concurrently(),
            ))
            .down(Operation::drop_index_concurrently("ix_a"));
        assert!(validate(&[m.clone()], &EmbeddedScripts).is_err());
        assert!(validate(&[m.non_transactional()], &EmbeddedScripts).is_ok());
    }

    #[test]
    fn test_validate_missing_routine() {
        let m = Migration::new("20240101000000_Fn")
            .unwrap()
            .up(Operation::install_routine("fn_unknown", 1))
            .down(Operation::sql("DROP FUNCTION fn_unknown()"));
        assert!(matches!(
            validate(&[m], &EmbeddedScripts),
            Err(MigratorError::Script(_))
        ));
    }
}
