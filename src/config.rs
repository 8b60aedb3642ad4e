// ABOUTME: Configuration file loading for the migrator
// ABOUTME: TOML settings with defaults; CLI flags and environment override them in main

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::catalog::REPORTING_PUBLICATION;
use crate::error::{MigratorError, Result};
use crate::history::{HistoryTable, DEFAULT_HISTORY_SCHEMA, DEFAULT_HISTORY_TABLE};
use crate::runner::RunnerOptions;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "trs-migrator.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database_url: Option<String>,
    pub scripts_dir: Option<PathBuf>,
    pub accept_invalid_certs: bool,
    pub history: HistoryConfig,
    pub publication: PublicationConfig,
    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    pub schema: String,
    pub table: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            schema: DEFAULT_HISTORY_SCHEMA.to_string(),
            table: DEFAULT_HISTORY_TABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublicationConfig {
    /// Publication shown by `publication show` when no name is given.
    ///
    /// Display only: the migrations always create and extend `trs_rep_sync`,
    /// since renaming it would change the checksums of applied migrations.
    pub name: String,
}

impl Default for PublicationConfig {
    fn default() -> Self {
        Self {
            name: REPORTING_PUBLICATION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    pub allow_out_of_order: bool,
    pub ignore_checksums: bool,
    pub lock_timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            allow_out_of_order: false,
            ignore_checksums: false,
            lock_timeout_secs: 30,
        }
    }
}

impl Config {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| MigratorError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            MigratorError::Config(format!("failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents).map_err(|e| {
            MigratorError::Config(format!("invalid config file '{}': {}", path.display(), e))
        })
    }

    /// Loads `path` if given, else `trs-migrator.toml` when present, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    tracing::debug!("Using config file {}", fallback.display());
                    Self::load(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                MigratorError::Config(
                    "no database URL configured. Pass --database-url, set TRS_DATABASE_URL \
                     or add database_url to the config file"
                        .to_string(),
                )
            })
    }

    pub fn history_table(&self) -> HistoryTable {
        HistoryTable::new(&self.history.schema, &self.history.table)
    }

    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            allow_out_of_order: self.runner.allow_out_of_order,
            ignore_checksums: self.runner.ignore_checksums,
        }
    }
}
