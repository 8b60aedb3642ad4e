// ABOUTME: Sources for versioned stored routine scripts
// ABOUTME: Routine files are compiled in by default and can be overridden from a directory

use std::path::{Path, PathBuf};

use crate::error::{MigratorError, Result};

/// Resolves routine definition files by name, e.g. `fn_split_names_v3.sql`.
pub trait ScriptSource: Send + Sync {
    fn load(&self, file_name: &str) -> Result<String>;

    fn contains(&self, file_name: &str) -> bool {
        self.load(file_name).is_ok()
    }
}

const EMBEDDED: &[(&str, &str)] = &[
    ("fn_split_names_v1.sql", include_str!("../sql/fn_split_names_v1.sql")),
    ("fn_split_names_v2.sql", include_str!("../sql/fn_split_names_v2.sql")),
    ("fn_split_names_v3.sql", include_str!("../sql/fn_split_names_v3.sql")),
    (
        "p_refresh_person_search_attributes_v4.sql",
        include_str!("../sql/p_refresh_person_search_attributes_v4.sql"),
    ),
    (
        "p_refresh_person_search_attributes_v5.sql",
        include_str!("../sql/p_refresh_person_search_attributes_v5.sql"),
    ),
    (
        "fn_resolve_record_by_trn_v1.sql",
        include_str!("../sql/fn_resolve_record_by_trn_v1.sql"),
    ),
];

/// Routine scripts shipped inside the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedScripts;

impl EmbeddedScripts {
    pub fn file_names() -> impl Iterator<Item = &'static str> {
        EMBEDDED.iter().map(|(name, _)| *name)
    }
}

impl ScriptSource for EmbeddedScripts {
    fn load(&self, file_name: &str) -> Result<String> {
        EMBEDDED
            .iter()
            .find(|(name, _)| *name == file_name)
            .map(|(_, body)| body.to_string())
            .ok_or_else(|| {
                MigratorError::Script(format!(
                    "'{}' is not bundled with this build. Pass --scripts-dir to load it from disk",
                    file_name
                ))
            })
    }
}

/// Routine scripts read from a directory at run time.
#[derive(Debug, Clone)]
pub struct DirectoryScripts {
    root: PathBuf,
}

impl DirectoryScripts {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(MigratorError::Config(format!(
                "scripts directory '{}' does not exist",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ScriptSource for DirectoryScripts {
    fn load(&self, file_name: &str) -> Result<String> {
        if file_name.contains('/') || file_name.contains('\\') || file_name.contains("..") {
            return Err(MigratorError::Script(format!(
                "'{}' is not a plain file name",
                file_name
            )));
        }

        let path = self.root.join(file_name);
        std::fs::read_to_string(&path).map_err(|e| {
            MigratorError::Script(format!("failed to read '{}': {}", path.display(), e))
        })
    }
}
