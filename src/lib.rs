// ABOUTME: Library entry point for the Teaching Record System schema migrator
// ABOUTME: Exposes the migration catalog, runner and PostgreSQL plumbing

pub mod catalog;
pub mod config;
pub mod error;
pub mod history;
pub mod migration;
pub mod postgres;
pub mod replication;
pub mod runner;
pub mod scripts;
pub mod sql;
pub mod target;

pub use error::MigratorError;
pub use migration::{Migration, MigrationId, Operation};
pub use runner::{Goal, Migrator, RunnerOptions};
pub use target::{MigrationTarget, PgTarget};
