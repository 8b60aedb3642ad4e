// ABOUTME: Migration records pairing ordered up and down operations
// ABOUTME: Rendering, checksums and routine replacement live here

mod id;
mod operation;
mod routine;

pub use id::MigrationId;
pub use operation::{ColumnDef, ForeignKey, IndexDef, IndexMethod, Operation};
pub use routine::RoutineFile;

use sha2::{Digest, Sha256};

use crate::error::{MigratorError, Result};
use crate::scripts::ScriptSource;

/// A versioned pair of forward and backward schema changes.
///
/// Down operations run in the order they are declared, so authors list them
/// as the mirror image of `up`.
#[derive(Debug, Clone, PartialEq)]
pub struct Migration {
    pub id: MigrationId,
    pub up: Vec<Operation>,
    pub down: Vec<Operation>,
    pub transactional: bool,
    pub irreversible: bool,
}

impl Migration {
    pub fn new(id: &str) -> Result<Self> {
        Ok(Self {
            id: id.parse()?,
            up: Vec::new(),
            down: Vec::new(),
            transactional: true,
            irreversible: false,
        })
    }

    pub fn up(mut self, op: Operation) -> Self {
        self.up.push(op);
        self
    }

    pub fn down(mut self, op: Operation) -> Self {
        self.down.push(op);
        self
    }

    /// Installs `<name>_v<version>.sql` and restores the previous version on rollback.
    pub fn replace_routine(self, name: &str, version: u32) -> Result<Self> {
        let file = RoutineFile::new(name, version);
        let previous = file.previous()?;
        Ok(self
            .up(Operation::InstallRoutine(file))
            .down(Operation::InstallRoutine(previous)))
    }

    /// Runs the statements outside a transaction block, as `CREATE INDEX CONCURRENTLY` requires.
    pub fn non_transactional(mut self) -> Self {
        self.transactional = false;
        self
    }

    pub fn irreversible(mut self) -> Self {
        self.irreversible = true;
        self
    }

    pub fn render_up(&self, scripts: &dyn ScriptSource) -> Result<Vec<String>> {
        render_all(&self.up, scripts)
            .map_err(|e| MigratorError::Migration(format!("{} (up): {}", self.id, e)))
    }

    pub fn render_down(&self, scripts: &dyn ScriptSource) -> Result<Vec<String>> {
        if self.irreversible {
            return Err(MigratorError::Migration(format!(
                "{} is irreversible and cannot be rolled back",
                self.id
            )));
        }
        render_all(&self.down, scripts)
            .map_err(|e| MigratorError::Migration(format!("{} (down): {}", self.id, e)))
    }

    /// SHA-256 over the rendered up statements, hex encoded.
    pub fn checksum(&self, scripts: &dyn ScriptSource) -> Result<String> {
        Ok(checksum_statements(&self.render_up(scripts)?))
    }

    /// Routine files referenced by either direction.
    pub fn routines(&self) -> impl Iterator<Item = &RoutineFile> {
        self.up.iter().chain(self.down.iter()).filter_map(Operation::routine)
    }

    pub fn has_concurrent_operations(&self) -> bool {
        self.up.iter().chain(self.down.iter()).any(Operation::is_concurrent)
    }

    pub fn summary(&self) -> String {
        self.up
            .iter()
            .map(Operation::describe)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn render_all(ops: &[Operation], scripts: &dyn ScriptSource) -> Result<Vec<String>> {
    ops.iter().map(|op| op.render(scripts)).collect()
}

pub(crate) fn checksum_statements(statements: &[String]) -> String {
    let mut hasher = Sha256::new();
    for statement in statements {
        hasher.update(statement.trim().as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}
