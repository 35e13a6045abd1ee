// file_diff.rs — The decorated diff model served to clients.
//
// A FileDiff is one file's worth of changes between two commits. Its hunks
// are individually addressable: each carries a self-contained patch that
// can be applied (or reverse-applied) on its own, and a stable id clients
// use to select hunks across sessions.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One contiguous edit region inside a file diff.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hunk {
    /// Stable content-derived id.
    pub id: String,

    /// Self-contained patch text for just this hunk. Empty for binary
    /// files.
    pub patch: String,

    /// Set when the target working tree has drifted and the patch no
    /// longer applies.
    #[serde(default)]
    pub is_outdated: bool,

    /// Set when a suggestion ledger records this hunk as applied.
    #[serde(default)]
    pub is_applied: bool,

    /// Set when a suggestion ledger records this hunk as dismissed.
    #[serde(default)]
    pub is_dismissed: bool,
}

/// All changes to one file between two commits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileDiff {
    /// Name on the old side; `None` for created files.
    pub orig_name: Option<String>,

    /// Name on the new side; `None` for deleted files.
    pub new_name: Option<String>,

    /// The name clients address the file by: the new name, unless the file
    /// was deleted.
    pub preferred_name: String,

    pub is_new: bool,
    pub is_deleted: bool,
    pub is_moved: bool,
    pub is_binary: bool,

    /// Hunks in byte-offset order.
    pub hunks: Vec<Hunk>,
}

/// Stable hunk id: first 16 hex chars of
/// `sha256(orig_name || new_name || patch_text)`.
pub fn hunk_id(orig_name: Option<&str>, new_name: Option<&str>, patch: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(orig_name.unwrap_or("").as_bytes());
    hasher.update(new_name.unwrap_or("").as_bytes());
    hasher.update(patch.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}
