// ABOUTME: The history table that records which migrations have been applied
// ABOUTME: Renders the DDL and DML the runner uses to read and write the applied set

use serde::Serialize;

use crate::sql::{quote_ident, quote_literal};

pub const DEFAULT_HISTORY_SCHEMA: &str = "public";
pub const DEFAULT_HISTORY_TABLE: &str = "__migrations_history";

/// Written into every history row so operators can tell which build applied it.
pub const PRODUCT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HistoryRecord {
    pub migration_id: String,
    pub checksum: String,
    pub product_version: String,
    pub applied_on: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTable {
    pub schema: String,
    pub table: String,
}

impl Default for HistoryTable {
    fn default() -> Self {
        Self {
            schema: DEFAULT_HISTORY_SCHEMA.to_string(),
            table: DEFAULT_HISTORY_TABLE.to_string(),
        }
    }
}

impl HistoryTable {
    pub fn new(schema: &str, table: &str) -> Self {
        Self {
            schema: schema.to_string(),
            table: table.to_string(),
        }
    }

    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }

    /// Key for `pg_advisory_lock`, derived from the table name so that
    /// runners sharing a history table exclude each other.
    pub fn lock_key_sql(&self) -> String {
        format!(
            "hashtext({})",
            quote_literal(&format!("{}.{}", self.schema, self.table))
        )
    }

    pub fn create_sql(&self) -> String {
        format!(
            "CREATE SCHEMA IF NOT EXISTS {schema};\n\
             CREATE TABLE IF NOT EXISTS {table} (\n    \
             migration_id varchar(150) NOT NULL PRIMARY KEY,\n    \
             checksum char(64) NOT NULL,\n    \
             product_version varchar(32) NOT NULL,\n    \
             applied_on timestamp with time zone NOT NULL DEFAULT now()\n\
             );",
            schema = quote_ident(&self.schema),
            table = self.qualified()
        )
    }

    pub fn select_sql(&self) -> String {
        format!(
            "SELECT migration_id, checksum, product_version, applied_on::text FROM {} ORDER BY migration_id",
            self.qualified()
        )
    }

    /// Parameters: `$1` migration id, `$2` checksum, `$3` product version.
    pub fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (migration_id, checksum, product_version) VALUES ($1, $2, $3)",
            self.qualified()
        )
    }

    /// Parameters: `$1` migration id.
    pub fn delete_sql(&self) -> String {
        format!("DELETE FROM {} WHERE migration_id = $1", self.qualified())
    }

    /// Literal-only insert for generated scripts.
    pub fn insert_literal_sql(&self, migration_id: &str, checksum: &str) -> String {
        format!(
            "INSERT INTO {} (migration_id, checksum, product_version) VALUES ({}, {}, {})",
            self.qualified(),
            quote_literal(migration_id),
            quote_literal(checksum),
            quote_literal(PRODUCT_VERSION)
        )
    }

    /// Literal-only delete for generated scripts.
    pub fn delete_literal_sql(&self, migration_id: &str) -> String {
        format!(
            "DELETE FROM {} WHERE migration_id = {}",
            self.qualified(),
            quote_literal(migration_id)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let history = HistoryTable::default();
        assert_eq!(history.qualified(), "\"public\".\"__migrations_history\"");
        assert_eq!(
            history.lock_key_sql(),
            "hashtext('public.__migrations_history')"
        );
    }

    #[test]
    fn test_create_sql_is_idempotent() {
        let sql = HistoryTable::new("trs", "schema_history").create_sql();
        assert!(sql.starts_with("CREATE SCHEMA IF NOT EXISTS \"trs\";"));
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS \"trs\".\"schema_history\""));
        assert!(sql.contains("migration_id varchar(150) NOT NULL PRIMARY KEY"));
    }

    #[test]
    fn test_dml() {
        let history = HistoryTable::default();
        assert_eq!(
            history.delete_sql(),
            "DELETE FROM \"public\".\"__migrations_history\" WHERE migration_id = $1"
        );
        assert!(history
            .select_sql()
            .ends_with("ORDER BY migration_id"));
        assert_eq!(
            history.insert_literal_sql("20231020100000_Initial", "abc"),
            format!(
                "INSERT INTO \"public\".\"__migrations_history\" (migration_id, checksum, product_version) \
                 VALUES ('20231020100000_Initial', 'abc', '{}')",
                PRODUCT_VERSION
            )
        );
    }
}
