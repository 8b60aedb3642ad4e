// ABOUTME: Declarative schema operations and their SQL rendering
// ABOUTME: Each operation renders to exactly one statement batch for PostgreSQL

use crate::error::{MigratorError, Result};
use crate::migration::routine::RoutineFile;
use crate::replication::publication;
use crate::scripts::ScriptSource;
use crate::sql::{ident_list, quote_ident, QualifiedName, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

impl ColumnDef {
    /// A `NOT NULL` column without a default.
    pub fn new(name: &str, sql_type: &str) -> Self {
        Self {
            name: name.to_string(),
            sql_type: sql_type.to_string(),
            nullable: false,
            default: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn default_sql(mut self, expr: &str) -> Self {
        self.default = Some(expr.to_string());
        self
    }

    fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", quote_ident(&self.name), self.sql_type);
        if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub name: String,
    pub columns: Vec<String>,
    pub references: QualifiedName,
    pub referenced_columns: Vec<String>,
    pub on_delete_cascade: bool,
}

impl ForeignKey {
    pub fn new(name: &str, column: &str, references: &str, referenced_column: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: vec![column.to_string()],
            references: QualifiedName::parse(references),
            referenced_columns: vec![referenced_column.to_string()],
            on_delete_cascade: false,
        }
    }

    pub fn cascade(mut self) -> Self {
        self.on_delete_cascade = true;
        self
    }

    fn to_sql(&self) -> String {
        let mut sql = format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_ident(&self.name),
            ident_list(&self.columns),
            self.references.quoted(),
            ident_list(&self.referenced_columns)
        );
        if self.on_delete_cascade {
            sql.push_str(" ON DELETE CASCADE");
        }
        sql
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMethod {
    BTree,
    Gin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexDef {
    pub name: String,
    pub table: QualifiedName,
    pub columns: Vec<String>,
    pub unique: bool,
    pub method: IndexMethod,
    pub filter: Option<String>,
    pub concurrently: bool,
}

impl IndexDef {
    pub fn new(name: &str, table: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            table: QualifiedName::parse(table),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
            method: IndexMethod::BTree,
            filter: None,
            concurrently: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn gin(mut self) -> Self {
        self.method = IndexMethod::Gin;
        self
    }

    pub fn filter(mut self, predicate: &str) -> Self {
        self.filter = Some(predicate.to_string());
        self
    }

    pub fn concurrently(mut self) -> Self {
        self.concurrently = true;
        self
    }

    fn to_sql(&self) -> String {
        let mut sql = String::from("CREATE ");
        if self.unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        if self.concurrently {
            sql.push_str("CONCURRENTLY ");
        }
        sql.push_str(&format!(
            "{} ON {}",
            quote_ident(&self.name),
            self.table.quoted()
        ));
        if self.method == IndexMethod::Gin {
            sql.push_str(" USING gin");
        }
        sql.push_str(&format!(" ({})", ident_list(&self.columns)));
        if let Some(filter) = &self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }
        sql
    }
}

/// A single declarative step inside a migration's up or down list.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    CreateTable {
        table: QualifiedName,
        columns: Vec<ColumnDef>,
        primary_key: Vec<String>,
        foreign_keys: Vec<ForeignKey>,
    },
    DropTable {
        table: QualifiedName,
    },
    AddColumn {
        table: QualifiedName,
        column: ColumnDef,
    },
    DropColumn {
        table: QualifiedName,
        column: String,
    },
    RenameColumn {
        table: QualifiedName,
        from: String,
        to: String,
    },
    AlterColumnDefault {
        table: QualifiedName,
        column: String,
        default: Option<String>,
    },
    AlterColumnNullability {
        table: QualifiedName,
        column: String,
        nullable: bool,
    },
    CreateIndex(IndexDef),
    DropIndex {
        name: QualifiedName,
        concurrently: bool,
    },
    InsertData {
        table: QualifiedName,
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    DeleteData {
        table: QualifiedName,
        key_column: String,
        keys: Vec<Value>,
    },
    UpdateData {
        table: QualifiedName,
        set: Vec<(String, Value)>,
        filter: String,
    },
    CreatePublication {
        name: String,
        tables: Vec<QualifiedName>,
    },
    DropPublication {
        name: String,
    },
    AddTablesToPublication {
        name: String,
        tables: Vec<QualifiedName>,
    },
    DropTablesFromPublication {
        name: String,
        tables: Vec<QualifiedName>,
    },
    InstallRoutine(RoutineFile),
    Sql(String),
}

fn names(tables: &[&str]) -> Vec<QualifiedName> {
    tables.iter().map(|t| QualifiedName::parse(t)).collect()
}

impl Operation {
    pub fn create_table(
        table: &str,
        columns: Vec<ColumnDef>,
        primary_key: &[&str],
        foreign_keys: Vec<ForeignKey>,
    ) -> Self {
        Operation::CreateTable {
            table: QualifiedName::parse(table),
            columns,
            primary_key: primary_key.iter().map(|c| c.to_string()).collect(),
            foreign_keys,
        }
    }

    pub fn drop_table(table: &str) -> Self {
        Operation::DropTable {
            table: QualifiedName::parse(table),
        }
    }

    pub fn add_column(table: &str, column: ColumnDef) -> Self {
        Operation::AddColumn {
            table: QualifiedName::parse(table),
            column,
        }
    }

    pub fn drop_column(table: &str, column: &str) -> Self {
        Operation::DropColumn {
            table: QualifiedName::parse(table),
            column: column.to_string(),
        }
    }

    pub fn rename_column(table: &str, from: &str, to: &str) -> Self {
        Operation::RenameColumn {
            table: QualifiedName::parse(table),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn alter_default(table: &str, column: &str, default: Option<&str>) -> Self {
        Operation::AlterColumnDefault {
            table: QualifiedName::parse(table),
            column: column.to_string(),
            default: default.map(str::to_string),
        }
    }

    pub fn alter_nullability(table: &str, column: &str, nullable: bool) -> Self {
        Operation::AlterColumnNullability {
            table: QualifiedName::parse(table),
            column: column.to_string(),
            nullable,
        }
    }

    pub fn create_index(index: IndexDef) -> Self {
        Operation::CreateIndex(index)
    }

    pub fn drop_index(name: &str) -> Self {
        Operation::DropIndex {
            name: QualifiedName::parse(name),
            concurrently: false,
        }
    }

    pub fn drop_index_concurrently(name: &str) -> Self {
        Operation::DropIndex {
            name: QualifiedName::parse(name),
            concurrently: true,
        }
    }

    pub fn insert_data(table: &str, columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Operation::InsertData {
            table: QualifiedName::parse(table),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    pub fn delete_data(table: &str, key_column: &str, keys: Vec<Value>) -> Self {
        Operation::DeleteData {
            table: QualifiedName::parse(table),
            key_column: key_column.to_string(),
            keys,
        }
    }

    pub fn update_data(table: &str, set: Vec<(&str, Value)>, filter: &str) -> Self {
        Operation::UpdateData {
            table: QualifiedName::parse(table),
            set: set.into_iter().map(|(c, v)| (c.to_string(), v)).collect(),
            filter: filter.to_string(),
        }
    }

    pub fn create_publication(name: &str, tables: &[&str]) -> Self {
        Operation::CreatePublication {
            name: name.to_string(),
            tables: names(tables),
        }
    }

    pub fn drop_publication(name: &str) -> Self {
        Operation::DropPublication {
            name: name.to_string(),
        }
    }

    pub fn add_to_publication(name: &str, tables: &[&str]) -> Self {
        Operation::AddTablesToPublication {
            name: name.to_string(),
            tables: names(tables),
        }
    }

    pub fn drop_from_publication(name: &str, tables: &[&str]) -> Self {
        Operation::DropTablesFromPublication {
            name: name.to_string(),
            tables: names(tables),
        }
    }

    pub fn install_routine(name: &str, version: u32) -> Self {
        Operation::InstallRoutine(RoutineFile::new(name, version))
    }

    pub fn sql(sql: &str) -> Self {
        Operation::Sql(sql.to_string())
    }

    /// Whether this operation cannot run inside a transaction block.
    pub fn is_concurrent(&self) -> bool {
        match self {
            Operation::CreateIndex(index) => index.concurrently,
            Operation::DropIndex { concurrently, .. } => *concurrently,
            _ => false,
        }
    }

    pub fn routine(&self) -> Option<&RoutineFile> {
        match self {
            Operation::InstallRoutine(file) => Some(file),
            _ => None,
        }
    }

    /// Short human-readable summary used by `list` and in logs.
    pub fn describe(&self) -> String {
        match self {
            Operation::CreateTable { table, .. } => format!("create table {}", table),
            Operation::DropTable { table } => format!("drop table {}", table),
            Operation::AddColumn { table, column } => {
                format!("add column {}.{}", table, column.name)
            }
            Operation::DropColumn { table, column } => format!("drop column {}.{}", table, column),
            Operation::RenameColumn { table, from, to } => {
                format!("rename column {}.{} to {}", table, from, to)
            }
            Operation::AlterColumnDefault { table, column, .. } => {
                format!("alter default of {}.{}", table, column)
            }
            Operation::AlterColumnNullability { table, column, .. } => {
                format!("alter nullability of {}.{}", table, column)
            }
            Operation::CreateIndex(index) => format!("create index {}", index.name),
            Operation::DropIndex { name, .. } => format!("drop index {}", name),
            Operation::InsertData { table, rows, .. } => {
                format!("insert {} row(s) into {}", rows.len(), table)
            }
            Operation::DeleteData { table, keys, .. } => {
                format!("delete {} row(s) from {}", keys.len(), table)
            }
            Operation::UpdateData { table, .. } => format!("update {}", table),
            Operation::CreatePublication { name, .. } => format!("create publication {}", name),
            Operation::DropPublication { name } => format!("drop publication {}", name),
            Operation::AddTablesToPublication { name, tables } => {
                format!("add {} table(s) to publication {}", tables.len(), name)
            }
            Operation::DropTablesFromPublication { name, tables } => {
                format!("drop {} table(s) from publication {}", tables.len(), name)
            }
            Operation::InstallRoutine(file) => format!("install {}", file),
            Operation::Sql(_) => "sql".to_string(),
        }
    }

    /// Renders this operation as a single SQL batch.
    pub fn render(&self, scripts: &dyn ScriptSource) -> Result<String> {
        let sql = match self {
            Operation::CreateTable {
                table,
                columns,
                primary_key,
                foreign_keys,
            } => {
                if columns.is_empty() {
                    return Err(MigratorError::Validation(format!(
                        "table {} must declare at least one column",
                        table
                    )));
                }
                let mut parts: Vec<String> = columns.iter().map(ColumnDef::to_sql).collect();
                if !primary_key.is_empty() {
                    parts.push(format!(
                        "CONSTRAINT {} PRIMARY KEY ({})",
                        quote_ident(&format!("pk_{}", table.name)),
                        ident_list(primary_key)
                    ));
                }
                parts.extend(foreign_keys.iter().map(ForeignKey::to_sql));
                format!(
                    "CREATE TABLE {} (\n    {}\n)",
                    table.quoted(),
                    parts.join(",\n    ")
                )
            }
            Operation::DropTable { table } => format!("DROP TABLE {}", table.quoted()),
            Operation::AddColumn { table, column } => {
                format!("ALTER TABLE {} ADD {}", table.quoted(), column.to_sql())
            }
            Operation::DropColumn { table, column } => format!(
                "ALTER TABLE {} DROP COLUMN {}",
                table.quoted(),
                quote_ident(column)
            ),
            Operation::RenameColumn { table, from, to } => format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                table.quoted(),
                quote_ident(from),
                quote_ident(to)
            ),
            Operation::AlterColumnDefault {
                table,
                column,
                default,
            } => match default {
                Some(expr) => format!(
                    "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {}",
                    table.quoted(),
                    quote_ident(column),
                    expr
                ),
                None => format!(
                    "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT",
                    table.quoted(),
                    quote_ident(column)
                ),
            },
            Operation::AlterColumnNullability {
                table,
                column,
                nullable,
            } => format!(
                "ALTER TABLE {} ALTER COLUMN {} {} NOT NULL",
                table.quoted(),
                quote_ident(column),
                if *nullable { "DROP" } else { "SET" }
            ),
            Operation::CreateIndex(index) => index.to_sql(),
            Operation::DropIndex { name, concurrently } => format!(
                "DROP INDEX {}{}",
                if *concurrently { "CONCURRENTLY " } else { "" },
                name.quoted()
            ),
            Operation::InsertData {
                table,
                columns,
                rows,
            } => {
                if rows.is_empty() {
                    return Err(MigratorError::Validation(format!(
                        "insert into {} has no rows",
                        table
                    )));
                }
                let mut values = Vec::with_capacity(rows.len());
                for row in rows {
                    if row.len() != columns.len() {
                        return Err(MigratorError::Validation(format!(
                            "insert into {} has a row with {} value(s) for {} column(s)",
                            table,
                            row.len(),
                            columns.len()
                        )));
                    }
                    let rendered: Vec<String> = row.iter().map(Value::to_sql).collect();
                    values.push(format!("({})", rendered.join(", ")));
                }
                format!(
                    "INSERT INTO {} ({})\nVALUES {}",
                    table.quoted(),
                    ident_list(columns),
                    values.join(",\n       ")
                )
            }
            Operation::DeleteData {
                table,
                key_column,
                keys,
            } => {
                if keys.is_empty() {
                    return Err(MigratorError::Validation(format!(
                        "delete from {} has no keys",
                        table
                    )));
                }
                let rendered: Vec<String> = keys.iter().map(Value::to_sql).collect();
                format!(
                    "DELETE FROM {} WHERE {} IN ({})",
                    table.quoted(),
                    quote_ident(key_column),
                    rendered.join(", ")
                )
            }
            Operation::UpdateData { table, set, filter } => {
                if set.is_empty() {
                    return Err(MigratorError::Validation(format!(
                        "update of {} sets no columns",
                        table
                    )));
                }
                let assignments: Vec<String> = set
                    .iter()
                    .map(|(column, value)| format!("{} = {}", quote_ident(column), value.to_sql()))
                    .collect();
                format!(
                    "UPDATE {} SET {} WHERE {}",
                    table.quoted(),
                    assignments.join(", "),
                    filter
                )
            }
            Operation::CreatePublication { name, tables } => {
                publication::create_publication_sql(name, tables)
            }
            Operation::DropPublication { name } => publication::drop_publication_sql(name),
            Operation::AddTablesToPublication { name, tables } => {
                publication::add_tables_sql(name, tables)
            }
            Operation::DropTablesFromPublication { name, tables } => {
                publication::drop_tables_sql(name, tables)
            }
            Operation::InstallRoutine(file) => scripts.load(&file.file_name())?,
            Operation::Sql(sql) => sql.clone(),
        };

        Ok(sql)
    }
}
