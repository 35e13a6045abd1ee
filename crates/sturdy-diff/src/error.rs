// error.rs — Error types for diff parsing and decoration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiffError {
    /// The raw diff text did not parse as git unified diff output.
    #[error("malformed diff at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

impl DiffError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        DiffError::Malformed {
            line,
            reason: reason.into(),
        }
    }
}
