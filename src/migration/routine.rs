// ABOUTME: Versioned stored routine file names
// ABOUTME: Parses and renders names like p_refresh_person_search_attributes_v5.sql

use std::fmt;
use std::str::FromStr;

use crate::error::MigratorError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutineFile {
    pub name: String,
    pub version: u32,
}

impl RoutineFile {
    pub fn new(name: &str, version: u32) -> Self {
        Self {
            name: name.to_string(),
            version,
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}_v{}.sql", self.name, self.version)
    }

    /// The definition this version replaced. Version 1 has none.
    pub fn previous(&self) -> Result<Self, MigratorError> {
        if self.version <= 1 {
            return Err(MigratorError::Validation(format!(
                "{} has no earlier version to restore; drop the routine explicitly instead",
                self.file_name()
            )));
        }
        Ok(Self::new(&self.name, self.version - 1))
    }
}

impl FromStr for RoutineFile {
    type Err = MigratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            MigratorError::Validation(format!(
                "'{}' is not a routine file name of the form <name>_v<N>.sql",
                s
            ))
        };

        let stem = s.strip_suffix(".sql").ok_or_else(invalid)?;
        let (name, version) = stem.rsplit_once("_v").ok_or_else(invalid)?;
        if name.is_empty() {
            return Err(invalid());
        }
        let version: u32 = version.parse().map_err(|_| invalid())?;
        if version == 0 {
            return Err(invalid());
        }

        Ok(Self::new(name, version))
    }
}

impl fmt::Display for RoutineFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}
