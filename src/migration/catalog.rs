//! Versioned migration file naming and catalog construction.
//!
//! Migration scripts follow the `V<version>__<description>.sql` naming
//! scheme. Anything else in the scripts directory (helper scripts, notes,
//! editor droppings) is silently excluded from the run.

use crate::error::MigrationError;
use crate::migration::source::ScriptSource;
use once_cell::sync::Lazy;
use regex::Regex;

/// Versioned file name pattern: `V<digits>__<description>.sql`
static FILENAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^V(\d+)__(.*)\.sql$").unwrap());

/// A migration script recognized by the versioned naming scheme
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationFile {
    /// File name as found in the source, e.g. `V3__seed_reference_data.sql`
    pub filename: String,
    /// Version digits exactly as written, e.g. `3`
    pub version: String,
    /// Numeric version used for ordering and duplicate detection
    pub version_number: i64,
    /// Human-readable description, underscores replaced with spaces
    pub description: String,
}

/// Parse a file name against the versioned naming scheme
///
/// # Arguments
///
/// * `filename` - Bare file name (no directory part)
///
/// # Returns
///
/// Returns `Ok(Some(MigrationFile))` for versioned scripts, `Ok(None)` for
/// names that do not match the scheme.
///
/// # Errors
///
/// Returns `MigrationError::InvalidVersion` if the version digits overflow
/// `i64`.
pub fn parse_filename(filename: &str) -> Result<Option<MigrationFile>, MigrationError> {
    let Some(caps) = FILENAME_PATTERN.captures(filename) else {
        return Ok(None);
    };

    // Capture groups 1 and 2 always exist when the pattern matches
    let version = caps.get(1).unwrap().as_str().to_string();
    let description = caps.get(2).unwrap().as_str().replace('_', " ");

    let version_number =
        version
            .parse::<i64>()
            .map_err(|_| MigrationError::InvalidVersion {
                filename: filename.to_string(),
            })?;

    Ok(Some(MigrationFile {
        filename: filename.to_string(),
        version,
        version_number,
        description,
    }))
}

/// Build the ordered migration catalog from a script source
///
/// Lists the source, keeps versioned scripts, and sorts them by numeric
/// version ascending. Two scripts claiming the same version is a
/// configuration mistake and fails the whole run rather than applying an
/// arbitrary one of them.
///
/// # Errors
///
/// Returns `MigrationError` if the source cannot be listed, a version does
/// not parse, or two scripts share a version.
pub fn build_catalog(source: &dyn ScriptSource) -> Result<Vec<MigrationFile>, MigrationError> {
    let mut catalog = Vec::new();
    for name in source.list()? {
        if let Some(file) = parse_filename(&name)? {
            catalog.push(file);
        }
    }

    catalog.sort_by_key(|f| f.version_number);

    for pair in catalog.windows(2) {
        if pair[0].version_number == pair[1].version_number {
            return Err(MigrationError::DuplicateVersion {
                version: pair[0].version_number,
                first: pair[0].filename.clone(),
                second: pair[1].filename.clone(),
            });
        }
    }

    Ok(catalog)
}
