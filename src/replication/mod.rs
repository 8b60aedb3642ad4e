// ABOUTME: Replication utilities module
// ABOUTME: Handles the logical replication publication consumed by the reporting subscriber

pub mod publication;

pub use publication::{
    add_tables_sql, create_publication_sql, drop_publication_sql, drop_tables_sql,
    list_publications, publication_tables,
};
