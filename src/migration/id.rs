// ABOUTME: Timestamp-prefixed migration identifiers
// ABOUTME: Ordering follows the 14-digit UTC timestamp, then the name

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::MigratorError;

const TIMESTAMP_LEN: usize = 14;

/// Identifies a migration, e.g. `20240611093000_RefreshPersonSearchAttributesV5`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MigrationId {
    timestamp: u64,
    name: String,
}

impl MigrationId {
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for MigrationId {
    type Err = MigratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, name) = s.split_once('_').ok_or_else(|| {
            MigratorError::Validation(format!(
                "migration id '{}' must look like YYYYMMDDHHMMSS_Name",
                s
            ))
        })?;

        if prefix.len() != TIMESTAMP_LEN || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MigratorError::Validation(format!(
                "migration id '{}' must start with a {}-digit timestamp",
                s, TIMESTAMP_LEN
            )));
        }

        if name.is_empty() {
            return Err(MigratorError::Validation(format!(
                "migration id '{}' has no name after the timestamp",
                s
            )));
        }

        let timestamp = prefix
            .parse::<u64>()
            .map_err(|e| MigratorError::Validation(format!("migration id '{}': {}", s, e)))?;

        Ok(Self {
            timestamp,
            name: name.to_string(),
        })
    }
}

impl Ord for MigrationId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for MigrationId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:0width$}_{}", self.timestamp, self.name, width = TIMESTAMP_LEN)
    }
}

impl Serialize for MigrationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
