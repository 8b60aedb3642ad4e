// ABOUTME: Plans and applies migrations against a target in catalog order
// ABOUTME: Also reports status and renders offline SQL scripts

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::catalog;
use crate::error::{MigratorError, Result};
use crate::history::{HistoryRecord, HistoryTable};
use crate::migration::{Migration, MigrationId};
use crate::scripts::ScriptSource;
use crate::target::{MigrationTarget, Step};

#[derive(Debug, Clone, Default)]
pub struct RunnerOptions {
    /// Apply pending migrations that sort before the newest applied one.
    pub allow_out_of_order: bool,
    pub ignore_checksums: bool,
}

/// The state the database should end in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Goal {
    Latest,
    /// Everything up to and including this migration is applied, nothing after it.
    Migration(String),
    /// Every migration reverted.
    Initial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlannedStep<'a> {
    pub migration: &'a Migration,
    pub direction: Direction,
}

/// Reverts come first (newest to oldest), then applies (oldest to newest).
#[derive(Debug, Clone, Default)]
pub struct Plan<'a> {
    pub steps: Vec<PlannedStep<'a>>,
}

impl Plan<'_> {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn reverts(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.direction == Direction::Down)
            .count()
    }

    /// Fails when the plan would revert anything.
    pub fn require_forward(&self) -> Result<()> {
        match self.steps.iter().find(|s| s.direction == Direction::Down) {
            Some(step) => Err(MigratorError::Validation(format!(
                "reaching this target reverts {} migration(s), starting with '{}'. \
                 Use `trs-migrator down --target` to revert migrations",
                self.reverts(),
                step.migration.id
            ))),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum StepEvent {
    Started {
        id: MigrationId,
        direction: Direction,
        index: usize,
        total: usize,
    },
    Finished {
        id: MigrationId,
        direction: Direction,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub applied: Vec<MigrationId>,
    pub reverted: Vec<MigrationId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    Applied,
    Pending,
    ChecksumMismatch,
    /// Recorded in history but absent from this build's catalog.
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub id: String,
    pub state: MigrationState,
    pub applied_on: Option<String>,
}

pub struct Migrator {
    migrations: Vec<Migration>,
    scripts: Box<dyn ScriptSource>,
    history: HistoryTable,
    options: RunnerOptions,
}

impl Migrator {
    pub fn new(
        migrations: Vec<Migration>,
        scripts: Box<dyn ScriptSource>,
        history: HistoryTable,
        options: RunnerOptions,
    ) -> Result<Self> {
        catalog::validate(&migrations, scripts.as_ref())?;
        Ok(Self {
            migrations,
            scripts,
            history,
            options,
        })
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    pub fn scripts(&self) -> &dyn ScriptSource {
        self.scripts.as_ref()
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.migrations
            .iter()
            .position(|m| m.id.to_string() == id)
            .ok_or_else(|| {
                MigratorError::Validation(format!(
                    "'{}' is not a known migration. Run `trs-migrator list` to see valid ids",
                    id
                ))
            })
    }

    /// Number of catalog entries that should be applied once `goal` is reached.
    fn boundary(&self, goal: &Goal) -> Result<usize> {
        match goal {
            Goal::Latest => Ok(self.migrations.len()),
            Goal::Initial => Ok(0),
            Goal::Migration(id) => Ok(self.position(id)? + 1),
        }
    }

    pub fn plan(&self, applied: &[HistoryRecord], goal: &Goal) -> Result<Plan<'_>> {
        let recorded: HashMap<&str, &HistoryRecord> = applied
            .iter()
            .map(|r| (r.migration_id.as_str(), r))
            .collect();

        let known: HashMap<String, &Migration> = self
            .migrations
            .iter()
            .map(|m| (m.id.to_string(), m))
            .collect();

        if let Some(unknown) = applied
            .iter()
            .find(|r| !known.contains_key(&r.migration_id))
        {
            return Err(MigratorError::Validation(format!(
                "the database has migration '{}' applied, but this build does not know it. \
                 Deploy the build that added it, or revert it with that build first",
                unknown.migration_id
            )));
        }

        if !self.options.ignore_checksums {
            for migration in &self.migrations {
                let id = migration.id.to_string();
                if let Some(record) = recorded.get(id.as_str()) {
                    let expected = migration.checksum(self.scripts.as_ref())?;
                    if record.checksum.trim() != expected {
                        return Err(MigratorError::Validation(format!(
                            "migration '{}' was changed after it was applied \
                             (recorded checksum {}, current {}). Add a new migration instead of \
                             editing an applied one, or pass --ignore-checksums",
                            id, record.checksum, expected
                        )));
                    }
                }
            }
        }

        let boundary = self.boundary(goal)?;
        let is_applied = |m: &Migration| recorded.contains_key(m.id.to_string().as_str());

        let mut steps = Vec::new();

        for migration in self.migrations[boundary..].iter().rev() {
            if is_applied(migration) {
                if migration.irreversible {
                    return Err(MigratorError::Validation(format!(
                        "cannot revert past '{}': it is irreversible",
                        migration.id
                    )));
                }
                steps.push(PlannedStep {
                    migration,
                    direction: Direction::Down,
                });
            }
        }

        let newest_applied = self.migrations[..boundary]
            .iter()
            .enumerate()
            .filter(|(_, m)| is_applied(*m))
            .map(|(i, _)| i)
            .max();

        for (index, migration) in self.migrations[..boundary].iter().enumerate() {
            if is_applied(migration) {
                continue;
            }
            if let Some(newest) = newest_applied {
                if index < newest && !self.options.allow_out_of_order {
                    return Err(MigratorError::Validation(format!(
                        "migration '{}' is pending but sorts before '{}', which is already applied. \
                         Pass --allow-out-of-order to apply it anyway",
                        migration.id, self.migrations[newest].id
                    )));
                }
            }
            steps.push(PlannedStep {
                migration,
                direction: Direction::Up,
            });
        }

        Ok(Plan { steps })
    }

    fn render_step(&self, planned: &PlannedStep<'_>) -> Result<Step> {
        let migration = planned.migration;
        let statements = match planned.direction {
            Direction::Up => migration.render_up(self.scripts.as_ref())?,
            Direction::Down => migration.render_down(self.scripts.as_ref())?,
        };
        Ok(Step {
            id: migration.id.clone(),
            checksum: migration.checksum(self.scripts.as_ref())?,
            statements,
            transactional: migration.transactional,
        })
    }

    /// Brings the target to `goal`, reporting progress through `on_event`.
    ///
    /// Stops at the first failing step; steps completed before it stay applied.
    pub async fn migrate<T, F>(
        &self,
        target: &mut T,
        goal: &Goal,
        on_event: F,
    ) -> Result<MigrationReport>
    where
        T: MigrationTarget + ?Sized,
        F: Fn(&StepEvent) + Send + Sync,
    {
        self.migrate_with(target, goal, |_| Ok(true), on_event).await
    }

    /// Like [`Migrator::migrate`], but hands the plan to `approve` while the lock is held.
    ///
    /// The plan passed to `approve` is exactly what runs. Returning `Ok(false)` leaves
    /// the database untouched; an error aborts with that error.
    pub async fn migrate_with<T, A, F>(
        &self,
        target: &mut T,
        goal: &Goal,
        approve: A,
        on_event: F,
    ) -> Result<MigrationReport>
    where
        T: MigrationTarget + ?Sized,
        A: FnOnce(&Plan<'_>) -> Result<bool> + Send,
        F: Fn(&StepEvent) + Send + Sync,
    {
        target.lock().await?;
        let result = self.migrate_locked(target, goal, approve, &on_event).await;
        let unlocked = target.unlock().await;

        let report = result?;
        unlocked?;
        Ok(report)
    }

    async fn migrate_locked<T, A, F>(
        &self,
        target: &mut T,
        goal: &Goal,
        approve: A,
        on_event: &F,
    ) -> Result<MigrationReport>
    where
        T: MigrationTarget + ?Sized,
        A: FnOnce(&Plan<'_>) -> Result<bool> + Send,
        F: Fn(&StepEvent) + Send + Sync,
    {
        target.ensure_history().await?;
        let applied = target.applied().await?;
        let plan = self.plan(&applied, goal)?;

        if plan.is_empty() {
            tracing::info!("Database is already at the requested migration");
            return Ok(MigrationReport::default());
        }

        if !approve(&plan)? {
            tracing::info!("Plan of {} step(s) was not approved", plan.len());
            return Ok(MigrationReport::default());
        }

        let steps = plan
            .steps
            .iter()
            .map(|planned| -> Result<(Direction, Step)> {
                Ok((planned.direction, self.render_step(planned)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let total = steps.len();
        let mut report = MigrationReport::default();

        for (index, (direction, step)) in steps.iter().enumerate() {
            on_event(&StepEvent::Started {
                id: step.id.clone(),
                direction: *direction,
                index,
                total,
            });

            tracing::info!("Running {} migration {}", direction, step.id);
            let outcome = match direction {
                Direction::Up => target.apply(step).await,
                Direction::Down => target.revert(step).await,
            };

            if let Err(e) = outcome {
                tracing::error!("Migration {} ({}) failed: {}", step.id, direction, e);
                return Err(MigratorError::Migration(format!(
                    "{} ({}) failed: {}",
                    step.id, direction, e
                )));
            }

            on_event(&StepEvent::Finished {
                id: step.id.clone(),
                direction: *direction,
            });

            match direction {
                Direction::Up => report.applied.push(step.id.clone()),
                Direction::Down => report.reverted.push(step.id.clone()),
            }
        }

        tracing::info!(
            "Applied {} and reverted {} migration(s)",
            report.applied.len(),
            report.reverted.len()
        );
        Ok(report)
    }

    pub fn status(&self, applied: &[HistoryRecord]) -> Result<Vec<MigrationStatus>> {
        let recorded: HashMap<&str, &HistoryRecord> = applied
            .iter()
            .map(|r| (r.migration_id.as_str(), r))
            .collect();

        let mut statuses = Vec::with_capacity(self.migrations.len());
        for migration in &self.migrations {
            let id = migration.id.to_string();
            let status = match recorded.get(id.as_str()) {
                Some(record) => {
                    let state = if record.checksum.trim()
                        == migration.checksum(self.scripts.as_ref())?
                    {
                        MigrationState::Applied
                    } else {
                        MigrationState::ChecksumMismatch
                    };
                    MigrationStatus {
                        id,
                        state,
                        applied_on: record.applied_on.clone(),
                    }
                }
                None => MigrationStatus {
                    id,
                    state: MigrationState::Pending,
                    applied_on: None,
                },
            };
            statuses.push(status);
        }

        for record in applied {
            if !statuses.iter().any(|s| s.id == record.migration_id) {
                statuses.push(MigrationStatus {
                    id: record.migration_id.clone(),
                    state: MigrationState::Unknown,
                    applied_on: record.applied_on.clone(),
                });
            }
        }

        Ok(statuses)
    }

    /// Renders a SQL script moving a database from `from` (exclusive) to `to` (inclusive).
    ///
    /// `None` for `from` means an empty database and `None` for `to` means the latest
    /// migration. When `to` sorts before `from` the script reverts instead.
    pub fn script(&self, from: Option<&str>, to: Option<&str>) -> Result<String> {
        let start = match from {
            Some(id) => self.position(id)? + 1,
            None => 0,
        };
        let end = match to {
            Some(id) => self.position(id)? + 1,
            None => self.migrations.len(),
        };

        let mut out = String::new();

        if end >= start {
            for migration in &self.migrations[start..end] {
                let statements = migration.render_up(self.scripts.as_ref())?;
                let checksum = migration.checksum(self.scripts.as_ref())?;
                let record = self
                    .history
                    .insert_literal_sql(&migration.id.to_string(), &checksum);
                write_script_block(&mut out, migration, Direction::Up, &statements, &record);
            }
        } else {
            for migration in self.migrations[end..start].iter().rev() {
                let statements = migration.render_down(self.scripts.as_ref())?;
                let record = self.history.delete_literal_sql(&migration.id.to_string());
                write_script_block(&mut out, migration, Direction::Down, &statements, &record);
            }
        }

        Ok(out)
    }
}

fn terminated(statement: &str) -> String {
    let trimmed = statement.trim_end();
    if trimmed.ends_with(';') {
        trimmed.to_string()
    } else {
        format!("{};", trimmed)
    }
}

fn write_script_block(
    out: &mut String,
    migration: &Migration,
    direction: Direction,
    statements: &[String],
    history_sql: &str,
) {
    out.push_str(&format!("-- {}: {}\n", direction, migration.id));
    if migration.transactional {
        out.push_str("BEGIN;\n\n");
    } else {
        out.push_str("-- runs outside a transaction block\n\n");
    }
    for statement in statements {
        out.push_str(&terminated(statement));
        out.push_str("\n\n");
    }
    out.push_str(&terminated(history_sql));
    out.push('\n');
    if migration.transactional {
        out.push_str("\nCOMMIT;\n");
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::{ColumnDef, Operation};
    use crate::scripts::EmbeddedScripts;
    use std::sync::Mutex;

    /// In-memory target recording every call.
    #[derive(Default)]
    struct RecordingTarget {
        history: Vec<HistoryRecord>,
        executed: Vec<String>,
        locked: bool,
        lock_calls: usize,
        fail_on: Option<String>,
    }

    #[async_trait::async_trait]
    impl MigrationTarget for RecordingTarget {
        async fn lock(&mut self) -> Result<()> {
            self.locked = true;
            self.lock_calls += 1;
            Ok(())
        }

        async fn unlock(&mut self) -> Result<()> {
            self.locked = false;
            Ok(())
        }

        async fn ensure_history(&mut self) -> Result<()> {
            Ok(())
        }

        async fn applied(&mut self) -> Result<Vec<HistoryRecord>> {
            Ok(self.history.clone())
        }

        async fn apply(&mut self, step: &Step) -> Result<()> {
            if self.fail_on.as_deref() == Some(step.id.name()) {
                return Err(MigratorError::Migration("boom".to_string()));
            }
            self.executed.extend(step.statements.iter().cloned());
            self.history.push(record(&step.id.to_string(), &step.checksum));
            Ok(())
        }

        async fn revert(&mut self, step: &Step) -> Result<()> {
            self.executed.extend(step.statements.iter().cloned());
            let id = step.id.to_string();
            self.history.retain(|r| r.migration_id != id);
            Ok(())
        }
    }

    fn record(id: &str, checksum: &str) -> HistoryRecord {
        HistoryRecord {
            migration_id: id.to_string(),
            checksum: checksum.to_string(),
            product_version: "test".to_string(),
            applied_on: None,
        }
    }

    fn sample_catalog() -> Vec<Migration> {
        vec![
            Migration::new("20240101000000_CreatePersons")
                .unwrap()
                .up(Operation::create_table(
                    "persons",
                    vec![ColumnDef::new("person_id", "uuid")],
                    &["person_id"],
                    vec![],
                ))
                .down(Operation::drop_table("persons")),
            Migration::new("20240102000000_AddTrn")
                .unwrap()
                .up(Operation::add_column(
                    "persons",
                    ColumnDef::new("trn", "character(7)").nullable(),
                ))
                .down(Operation::drop_column("persons", "trn")),
            Migration::new("20240103000000_SplitNames")
                .unwrap()
                .up(Operation::install_routine("fn_split_names", 1))
                .down(Operation::sql("DROP FUNCTION fn_split_names(varchar[])")),
        ]
    }

    fn migrator(migrations: Vec<Migration>, options: RunnerOptions) -> Migrator {
        Migrator::new(
            migrations,
            Box::new(EmbeddedScripts),
            HistoryTable::default(),
            options,
        )
        .unwrap()
    }

    fn applied_through(m: &Migrator, count: usize) -> Vec<HistoryRecord> {
        m.migrations()[..count]
            .iter()
            .map(|mig| record(&mig.id.to_string(), &mig.checksum(m.scripts()).unwrap()))
            .collect()
    }

    fn ids(plan: &Plan<'_>) -> Vec<(String, Direction)> {
        plan.steps
            .iter()
            .map(|s| (s.migration.id.name().to_string(), s.direction))
            .collect()
    }

    #[test]
    fn test_plan_latest_from_empty() {
        let m = migrator(sample_catalog(), RunnerOptions::default());
        let plan = m.plan(&[], &Goal::Latest).unwrap();
        assert_eq!(
            ids(&plan),
            vec![
                ("CreatePersons".to_string(), Direction::Up),
                ("AddTrn".to_string(), Direction::Up),
                ("SplitNames".to_string(), Direction::Up),
            ]
        );
    }

    #[test]
    fn test_plan_to_target_migration() {
        let m = migrator(sample_catalog(), RunnerOptions::default());
        let plan = m
            .plan(&[], &Goal::Migration("20240102000000_AddTrn".to_string()))
            .unwrap();
        assert_eq!(plan.len(), 2);

        let applied = applied_through(&m, 3);
        let plan = m
            .plan(&applied, &Goal::Migration("20240101000000_CreatePersons".to_string()))
            .unwrap();
        assert_eq!(
            ids(&plan),
            vec![
                ("SplitNames".to_string(), Direction::Down),
                ("AddTrn".to_string(), Direction::Down),
            ]
        );
    }

    #[test]
    fn test_plan_initial_reverts_everything() {
        let m = migrator(sample_catalog(), RunnerOptions::default());
        let applied = applied_through(&m, 2);
        let plan = m.plan(&applied, &Goal::Initial).unwrap();
        assert_eq!(
            ids(&plan),
            vec![
                ("AddTrn".to_string(), Direction::Down),
                ("CreatePersons".to_string(), Direction::Down),
            ]
        );
    }

    #[test]
    fn test_plan_up_to_date_is_empty() {
        let m = migrator(sample_catalog(), RunnerOptions::default());
        let applied = applied_through(&m, 3);
        assert!(m.plan(&applied, &Goal::Latest).unwrap().is_empty());
    }

    #[test]
    fn test_plan_rejects_unknown_history() {
        let m = migrator(sample_catalog(), RunnerOptions::default());
        let mut applied = applied_through(&m, 1);
        applied.push(record("20991231000000_FromTheFuture", "x"));
        let err = m.plan(&applied, &Goal::Latest).unwrap_err();
        assert!(err.to_string().contains("20991231000000_FromTheFuture"));
    }

    #[test]
    fn test_plan_rejects_unknown_goal() {
        let m = migrator(sample_catalog(), RunnerOptions::default());
        assert!(m
            .plan(&[], &Goal::Migration("20240101000000_Nope".to_string()))
            .is_err());
    }

    #[test]
    fn test_plan_detects_checksum_drift() {
        let m = migrator(sample_catalog(), RunnerOptions::default());
        let applied = vec![record("20240101000000_CreatePersons", "0000")];
        assert!(matches!(
            m.plan(&applied, &Goal::Latest),
            Err(MigratorError::Validation(_))
        ));

        let lenient = migrator(
            sample_catalog(),
            RunnerOptions {
                ignore_checksums: true,
                ..Default::default()
            },
        );
        assert_eq!(lenient.plan(&applied, &Goal::Latest).unwrap().len(), 2);
    }

    #[test]
    fn test_plan_out_of_order() {
        let m = migrator(sample_catalog(), RunnerOptions::default());
        let mut applied = applied_through(&m, 3);
        applied.remove(1);
        assert!(m.plan(&applied, &Goal::Latest).is_err());

        let lenient = migrator(
            sample_catalog(),
            RunnerOptions {
                allow_out_of_order: true,
                ..Default::default()
            },
        );
        let plan = lenient.plan(&applied, &Goal::Latest).unwrap();
        assert_eq!(ids(&plan), vec![("AddTrn".to_string(), Direction::Up)]);
    }

    #[test]
    fn test_plan_refuses_irreversible_down() {
        let mut catalog = sample_catalog();
        catalog.push(
            Migration::new("20240104000000_Backfill")
                .unwrap()
                .up(Operation::sql("UPDATE persons SET trn = NULL"))
                .irreversible(),
        );
        let m = migrator(catalog, RunnerOptions::default());
        let applied = applied_through(&m, 4);
        assert!(m.plan(&applied, &Goal::Initial).is_err());
        assert!(m
            .plan(
                &applied,
                &Goal::Migration("20240104000000_Backfill".to_string())
            )
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_migrate_applies_and_reports_events() {
        let m = migrator(sample_catalog(), RunnerOptions::default());
        let mut target = RecordingTarget::default();
        let events = Mutex::new(Vec::new());

        let report = m
            .migrate(&mut target, &Goal::Latest, |event| {
                events.lock().unwrap().push(format!("{:?}", event))
            })
            .await
            .unwrap();

        assert_eq!(report.applied.len(), 3);
        assert!(report.reverted.is_empty());
        assert_eq!(target.history.len(), 3);
        assert_eq!(target.lock_calls, 1);
        assert!(!target.locked);
        assert!(target.executed[0].starts_with("CREATE TABLE \"persons\""));
        assert!(target.executed[2].contains("fn_split_names"));
        assert_eq!(events.lock().unwrap().len(), 6);

        let again = m.migrate(&mut target, &Goal::Latest, |_| {}).await.unwrap();
        assert!(again.applied.is_empty());
    }

    #[tokio::test]
    async fn test_migrate_reverts_to_initial() {
        let m = migrator(sample_catalog(), RunnerOptions::default());
        let mut target = RecordingTarget::default();
        m.migrate(&mut target, &Goal::Latest, |_| {}).await.unwrap();

        let report = m.migrate(&mut target, &Goal::Initial, |_| {}).await.unwrap();
        assert_eq!(
            report
                .reverted
                .iter()
                .map(|id| id.name().to_string())
                .collect::<Vec<_>>(),
            vec!["SplitNames", "AddTrn", "CreatePersons"]
        );
        assert!(target.history.is_empty());
        assert_eq!(
            target.executed.last().map(String::as_str),
            Some("DROP TABLE \"persons\"")
        );
    }

    #[tokio::test]
    async fn test_migrate_stops_at_failure_and_unlocks() {
        let m = migrator(sample_catalog(), RunnerOptions::default());
        let mut target = RecordingTarget {
            fail_on: Some("AddTrn".to_string()),
            ..Default::default()
        };

        let err = m.migrate(&mut target, &Goal::Latest, |_| {}).await.unwrap_err();
        assert!(err.to_string().contains("20240102000000_AddTrn"));
        assert_eq!(target.history.len(), 1);
        assert!(!target.locked);
    }

    #[test]
    fn test_require_forward() {
        let m = migrator(sample_catalog(), RunnerOptions::default());

        let backwards = m
            .plan(
                &applied_through(&m, 3),
                &Goal::Migration("20240101000000_CreatePersons".to_string()),
            )
            .unwrap();
        assert_eq!(backwards.reverts(), 2);
        let err = backwards.require_forward().unwrap_err();
        assert!(matches!(err, MigratorError::Validation(_)));
        assert!(err.to_string().contains("20240103000000_SplitNames"));
        assert!(err.to_string().contains("trs-migrator down"));

        let forwards = m.plan(&applied_through(&m, 1), &Goal::Latest).unwrap();
        assert_eq!(forwards.reverts(), 0);
        assert!(forwards.require_forward().is_ok());
    }

    #[tokio::test]
    async fn test_migrate_with_refuses_reverts_for_forward_runs() {
        let m = migrator(sample_catalog(), RunnerOptions::default());
        let mut target = RecordingTarget::default();
        m.migrate(&mut target, &Goal::Latest, |_| {}).await.unwrap();
        let executed = target.executed.len();

        let err = m
            .migrate_with(
                &mut target,
                &Goal::Migration("20240101000000_CreatePersons".to_string()),
                |plan| {
                    plan.require_forward()?;
                    Ok(true)
                },
                |_| {},
            )
            .await
            .unwrap_err();

        assert!(matches!(err, MigratorError::Validation(_)));
        assert_eq!(target.history.len(), 3);
        assert_eq!(target.executed.len(), executed);
        assert!(!target.locked);
    }

    #[tokio::test]
    async fn test_migrate_with_declined_plan_changes_nothing() {
        let m = migrator(sample_catalog(), RunnerOptions::default());
        let mut target = RecordingTarget::default();
        let mut seen = 0;

        let report = m
            .migrate_with(
                &mut target,
                &Goal::Latest,
                |plan| {
                    seen = plan.len();
                    Ok(false)
                },
                |_| {},
            )
            .await
            .unwrap();

        assert_eq!(seen, 3);
        assert!(report.applied.is_empty());
        assert!(target.history.is_empty());
        assert!(target.executed.is_empty());
        assert!(!target.locked);
    }

    #[test]
    fn test_status() {
        let m = migrator(sample_catalog(), RunnerOptions::default());
        let mut applied = applied_through(&m, 1);
        applied.push(record("20240102000000_AddTrn", "stale"));
        applied.push(record("20231231000000_Removed", "x"));

        let states: Vec<MigrationState> =
            m.status(&applied).unwrap().iter().map(|s| s.state).collect();
        assert_eq!(
            states,
            vec![
                MigrationState::Applied,
                MigrationState::ChecksumMismatch,
                MigrationState::Pending,
                MigrationState::Unknown,
            ]
        );
    }

    #[test]
    fn test_script_up_range() {
        let m = migrator(sample_catalog(), RunnerOptions::default());
        let script = m
            .script(Some("20240101000000_CreatePersons"), None)
            .unwrap();
        assert!(!script.contains("CreatePersons"));
        assert!(script.starts_with("-- up: 20240102000000_AddTrn\nBEGIN;\n\n"));
        assert!(script.contains("ALTER TABLE \"persons\" ADD \"trn\" character(7);"));
        assert!(script.contains("VALUES ('20240103000000_SplitNames'"));
        assert_eq!(script.matches("COMMIT;").count(), 2);
    }

    #[test]
    fn test_script_down_range() {
        let m = migrator(sample_catalog(), RunnerOptions::default());
        let script = m
            .script(Some("20240103000000_SplitNames"), Some("20240101000000_CreatePersons"))
            .unwrap();
        let split = script.find("-- down: 20240103000000_SplitNames").unwrap();
        let trn = script.find("-- down: 20240102000000_AddTrn").unwrap();
        assert!(split < trn);
        assert!(script.contains("DELETE FROM \"public\".\"__migrations_history\" WHERE migration_id = '20240102000000_AddTrn';"));
        assert!(!script.contains("DROP TABLE"));
    }
}
