// ABOUTME: PostgreSQL publication DDL rendering and catalog queries
// ABOUTME: Migrations render through these helpers; the CLI inspects live publications

use tokio_postgres::Client;

use crate::error::Result;
use crate::sql::{quote_ident, QualifiedName};

fn table_list(tables: &[QualifiedName]) -> String {
    tables
        .iter()
        .map(QualifiedName::quoted)
        .collect::<Vec<_>>()
        .join(", ")
}

/// `CREATE PUBLICATION`, optionally for an initial set of tables.
pub fn create_publication_sql(name: &str, tables: &[QualifiedName]) -> String {
    if tables.is_empty() {
        format!("CREATE PUBLICATION {}", quote_ident(name))
    } else {
        format!(
            "CREATE PUBLICATION {} FOR TABLE {}",
            quote_ident(name),
            table_list(tables)
        )
    }
}

pub fn drop_publication_sql(name: &str) -> String {
    format!("DROP PUBLICATION IF EXISTS {}", quote_ident(name))
}

pub fn add_tables_sql(name: &str, tables: &[QualifiedName]) -> String {
    format!(
        "ALTER PUBLICATION {} ADD TABLE {}",
        quote_ident(name),
        table_list(tables)
    )
}

pub fn drop_tables_sql(name: &str, tables: &[QualifiedName]) -> String {
    format!(
        "ALTER PUBLICATION {} DROP TABLE {}",
        quote_ident(name),
        table_list(tables)
    )
}

/// Lists all publications in the current database.
pub async fn list_publications(client: &Client) -> Result<Vec<String>> {
    let rows = client
        .query("SELECT pubname FROM pg_publication ORDER BY pubname", &[])
        .await?;

    Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
}

/// Lists the tables exposed by a publication.
pub async fn publication_tables(client: &Client, name: &str) -> Result<Vec<QualifiedName>> {
    let rows = client
        .query(
            "SELECT schemaname, tablename FROM pg_publication_tables \
             WHERE pubname = $1 ORDER BY schemaname, tablename",
            &[&name],
        )
        .await?;

    tracing::debug!("Publication '{}' exposes {} table(s)", name, rows.len());

    Ok(rows
        .iter()
        .map(|row| {
            let schema: String = row.get(0);
            let table: String = row.get(1);
            QualifiedName::new(Some(&schema), &table)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_publication_without_tables() {
        assert_eq!(
            create_publication_sql("trs_rep_sync", &[]),
            "CREATE PUBLICATION \"trs_rep_sync\""
        );
    }

    #[test]
    fn test_create_publication_with_tables() {
        let tables = vec![QualifiedName::parse("persons"), QualifiedName::parse("public.alerts")];
        assert_eq!(
            create_publication_sql("trs_rep_sync", &tables),
            "CREATE PUBLICATION \"trs_rep_sync\" FOR TABLE \"persons\", \"public\".\"alerts\""
        );
    }

    #[test]
    fn test_alter_publication_tables() {
        let tables = vec![QualifiedName::parse("notes")];
        assert_eq!(
            add_tables_sql("trs_rep_sync", &tables),
            "ALTER PUBLICATION \"trs_rep_sync\" ADD TABLE \"notes\""
        );
        assert_eq!(
            drop_tables_sql("trs_rep_sync", &tables),
            "ALTER PUBLICATION \"trs_rep_sync\" DROP TABLE \"notes\""
        );
        assert_eq!(
            drop_publication_sql("trs_rep_sync"),
            "DROP PUBLICATION IF EXISTS \"trs_rep_sync\""
        );
    }
}
