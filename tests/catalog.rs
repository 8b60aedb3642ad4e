// ABOUTME: Offline checks of the shipped TRS migration catalog
// ABOUTME: Exercises the public API without a database

use trs_migrator::catalog::{self, REPORTING_PUBLICATION};
use trs_migrator::history::HistoryTable;
use trs_migrator::migration::Operation;
use trs_migrator::scripts::EmbeddedScripts;
use trs_migrator::{Goal, Migrator, RunnerOptions};

fn migrator() -> Migrator {
    Migrator::new(
        catalog::migrations().unwrap(),
        Box::new(EmbeddedScripts),
        HistoryTable::default(),
        RunnerOptions::default(),
    )
    .unwrap()
}

#[test]
fn test_every_migration_is_pending_on_an_empty_database() {
    let m = migrator();
    let plan = m.plan(&[], &Goal::Latest).unwrap();
    assert_eq!(plan.len(), m.migrations().len());
}

#[test]
fn test_publication_is_created_before_it_is_extended() {
    let m = migrator();
    let position = |pred: &dyn Fn(&Operation) -> bool| {
        m.migrations()
            .iter()
            .position(|mig| mig.up.iter().any(pred))
            .unwrap()
    };

    let created = position(&|op| {
        matches!(op, Operation::CreatePublication { name, .. } if name == REPORTING_PUBLICATION)
    });
    let extended = position(&|op| {
        matches!(op, Operation::AddTablesToPublication { name, .. } if name == REPORTING_PUBLICATION)
    });
    assert!(created < extended);
}

#[test]
fn test_full_script_covers_all_migrations() {
    let m = migrator();
    let script = m.script(None, None).unwrap();

    for migration in m.migrations() {
        assert!(
            script.contains(&format!("-- up: {}\n", migration.id)),
            "{} missing from script",
            migration.id
        );
    }
    assert!(script.contains("CREATE PUBLICATION \"trs_rep_sync\""));
    assert!(script.contains("CREATE OR REPLACE PROCEDURE p_refresh_person_search_attributes"));
    assert!(script.contains("-- runs outside a transaction block"));
}

#[test]
fn test_full_revert_script_ends_with_baseline() {
    let m = migrator();
    let latest = m.migrations().last().unwrap().id.to_string();
    let script = m.script(Some(&latest), None).unwrap();
    assert!(script.is_empty());

    let first = m.migrations().first().unwrap().id.to_string();
    let revert = m.script(Some(&latest), Some(&first)).unwrap();
    assert!(!revert.contains(&format!("-- down: {}", first)));
    assert!(revert.contains("DROP PUBLICATION IF EXISTS \"trs_rep_sync\""));
    assert!(revert.contains("CREATE OR REPLACE FUNCTION fn_split_names"));
}
