//! Checksum calculation for migration scripts

use sha2::{Digest, Sha256};

/// Calculate the history-table checksum of a migration script
///
/// The checksum is the first 7 hex digits of the SHA-256 hash of the script
/// content, parsed as a base-16 integer. It is stored alongside each applied
/// migration so operators can spot a script that was edited after the fact.
///
/// # Arguments
///
/// * `content` - Full text of the migration script
///
/// # Returns
///
/// Returns the truncated checksum as an `i32` (always non-negative, at most
/// `0xFFFFFFF`).
pub fn checksum_of(content: &str) -> i32 {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    // 7 hex digits top out at 0xFFFFFFF, which always fits in i32
    i32::from_str_radix(&hash[..7], 16).unwrap()
}
