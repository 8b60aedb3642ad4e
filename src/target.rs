// ABOUTME: Databases that migrations are applied to
// ABOUTME: PgTarget runs each step and its history write atomically on PostgreSQL

use async_trait::async_trait;
use tokio_postgres::Client;

use crate::error::Result;
use crate::history::{HistoryRecord, HistoryTable, PRODUCT_VERSION};
use crate::migration::MigrationId;

/// A fully rendered migration, ready to run in one direction.
#[derive(Debug, Clone)]
pub struct Step {
    pub id: MigrationId,
    pub checksum: String,
    pub statements: Vec<String>,
    pub transactional: bool,
}

#[async_trait]
pub trait MigrationTarget: Send {
    /// Blocks other runners until `unlock`.
    async fn lock(&mut self) -> Result<()>;
    async fn unlock(&mut self) -> Result<()>;
    async fn ensure_history(&mut self) -> Result<()>;
    /// Applied migrations; empty when the history table does not exist yet.
    async fn applied(&mut self) -> Result<Vec<HistoryRecord>>;
    async fn apply(&mut self, step: &Step) -> Result<()>;
    async fn revert(&mut self, step: &Step) -> Result<()>;
}

pub struct PgTarget {
    client: Client,
    history: HistoryTable,
}

impl PgTarget {
    pub fn new(client: Client, history: HistoryTable) -> Self {
        Self { client, history }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl MigrationTarget for PgTarget {
    async fn lock(&mut self) -> Result<()> {
        tracing::debug!("Acquiring migration lock on {}", self.history.qualified());
        self.client
            .batch_execute(&format!(
                "SELECT pg_advisory_lock({})",
                self.history.lock_key_sql()
            ))
            .await?;
        Ok(())
    }

    async fn unlock(&mut self) -> Result<()> {
        self.client
            .batch_execute(&format!(
                "SELECT pg_advisory_unlock({})",
                self.history.lock_key_sql()
            ))
            .await?;
        tracing::debug!("Released migration lock");
        Ok(())
    }

    async fn ensure_history(&mut self) -> Result<()> {
        self.client.batch_execute(&self.history.create_sql()).await?;
        Ok(())
    }

    async fn applied(&mut self) -> Result<Vec<HistoryRecord>> {
        let exists: bool = self
            .client
            .query_one(
                "SELECT to_regclass($1::text) IS NOT NULL",
                &[&self.history.qualified()],
            )
            .await?
            .get(0);

        if !exists {
            tracing::debug!("History table {} does not exist yet", self.history.qualified());
            return Ok(Vec::new());
        }

        let rows = self.client.query(&self.history.select_sql(), &[]).await?;
        Ok(rows
            .iter()
            .map(|row| HistoryRecord {
                migration_id: row.get(0),
                checksum: row.get(1),
                product_version: row.get(2),
                applied_on: row.get(3),
            })
            .collect())
    }

    async fn apply(&mut self, step: &Step) -> Result<()> {
        let id = step.id.to_string();
        let insert = self.history.insert_sql();

        if step.transactional {
            let tx = self.client.transaction().await?;
            for statement in &step.statements {
                tx.batch_execute(statement).await?;
            }
            tx.execute(&insert, &[&id, &step.checksum, &PRODUCT_VERSION])
                .await?;
            tx.commit().await?;
        } else {
            for statement in &step.statements {
                self.client.batch_execute(statement).await?;
            }
            self.client
                .execute(&insert, &[&id, &step.checksum, &PRODUCT_VERSION])
                .await?;
        }

        Ok(())
    }

    async fn revert(&mut self, step: &Step) -> Result<()> {
        let id = step.id.to_string();
        let delete = self.history.delete_sql();

        if step.transactional {
            let tx = self.client.transaction().await?;
            for statement in &step.statements {
                tx.batch_execute(statement).await?;
            }
            tx.execute(&delete, &[&id]).await?;
            tx.commit().await?;
        } else {
            for statement in &step.statements {
                self.client.batch_execute(statement).await?;
            }
            self.client.execute(&delete, &[&id]).await?;
        }

        Ok(())
    }
}
