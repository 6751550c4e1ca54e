//! Versioned SQL migration system
//!
//! This module provides the migration pipeline:
//! - Script discovery and versioned file name parsing
//! - Content checksums for the history table
//! - History table access and record types
//! - Failure classification for already-applied schema state
//! - The migrator that ties it all together

pub mod catalog;
pub mod checksum;
pub mod classify;
pub mod history;
pub mod migrator;
pub mod record;
pub mod source;

pub use catalog::{build_catalog, parse_filename, MigrationFile};
pub use checksum::checksum_of;
pub use classify::{ErrorClassifier, FailureKind, DEFAULT_BENIGN_PATTERNS};
pub use history::{AppliedSet, HistoryStore};
pub use migrator::{Migrator, RunSummary};
pub use record::{HistoryRecord, INSTALLED_BY_APPLIED, INSTALLED_BY_SKIPPED};
pub use source::{DirScriptSource, ScriptSource};

// Re-export for convenience
pub use crate::error::MigrationError;
