//! Migration script discovery and loading.
//!
//! The runner reads scripts through the [`ScriptSource`] trait so the
//! filesystem layout stays an implementation detail. [`DirScriptSource`] is
//! the production implementation over a flat directory of `.sql` files.

use crate::error::MigrationError;
use std::fs;
use std::path::PathBuf;

/// Source of migration scripts
pub trait ScriptSource {
    /// List all candidate file names, in no particular order
    ///
    /// Names that do not match the versioned naming scheme are filtered out
    /// later when the catalog is built.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError` if the source cannot be enumerated.
    fn list(&self) -> Result<Vec<String>, MigrationError>;

    /// Read the full content of one script by file name
    ///
    /// # Errors
    ///
    /// Returns `MigrationError` if the script is missing or unreadable.
    fn read(&self, name: &str) -> Result<String, MigrationError>;
}

/// Scripts stored as files in a single directory
pub struct DirScriptSource {
    dir: PathBuf,
}

impl DirScriptSource {
    /// Create a source over the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory this source reads from
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }
}

impl ScriptSource for DirScriptSource {
    fn list(&self) -> Result<Vec<String>, MigrationError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            MigrationError::FileNotFound(format!(
                "Failed to read migrations directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                MigrationError::FileNotFound(format!(
                    "Failed to read entry in {}: {}",
                    self.dir.display(),
                    e
                ))
            })?;

            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => {
                    log::debug!("Skipping non-UTF-8 file name in migrations directory: {raw:?}");
                }
            }
        }

        Ok(names)
    }

    fn read(&self, name: &str) -> Result<String, MigrationError> {
        let path = self.dir.join(name);
        fs::read_to_string(&path).map_err(|e| {
            MigrationError::FileNotFound(format!(
                "Failed to read migration file {}: {}",
                path.display(),
                e
            ))
        })
    }
}
