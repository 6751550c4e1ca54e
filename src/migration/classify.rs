//! Failure classification for migration errors.
//!
//! Some environments carry schema state that predates the history table, so
//! a script can fail precisely because its work is already done. Errors whose
//! message contains one of the configured patterns are treated as
//! already-applied rather than fatal.

/// Error substrings that mark a failure as already-applied schema state
///
/// `reward_rate` is a legacy column that older environments created by hand;
/// any failure mentioning it gets the same treatment.
pub const DEFAULT_BENIGN_PATTERNS: [&str; 5] = [
    "already exists",
    "violates check constraint",
    "editability test FAILED",
    "does not exist",
    "reward_rate",
];

/// Outcome of classifying a migration failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Schema state already reflects the migration; record it and continue
    Benign,
    /// Genuine failure; stop the run
    Fatal,
}

/// Classifies migration failures by error message
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    patterns: Vec<String>,
}

impl ErrorClassifier {
    /// Create a classifier with the given benign patterns
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }

    /// Patterns currently in effect
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Classify an error message. Matching is case-sensitive substring search.
    pub fn classify(&self, message: &str) -> FailureKind {
        if self.patterns.iter().any(|p| message.contains(p.as_str())) {
            FailureKind::Benign
        } else {
            FailureKind::Fatal
        }
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_BENIGN_PATTERNS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        )
    }
}
