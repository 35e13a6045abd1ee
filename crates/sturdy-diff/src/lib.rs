//! # sturdy-diff
//!
//! Hunk-decorated unified diffs between two commits.
//!
//! Raw `git diff` output goes in; a list of [`FileDiff`]s comes out, each
//! hunk carrying a standalone patch and a stable content-derived id so
//! clients can select hunks individually — the basis for suggestions,
//! per-hunk undo and partial applies.
//!
//! ## Key components
//!
//! - [`Unidiff`] — builder: `Unidiff::new(raw).with_expanded_hunks()
//!   .with_ignore_binary().decorate()`.
//! - [`FileDiff`] / [`Hunk`] — the decorated model; hunks keep byte-offset
//!   order inside a file.
//! - [`hunk_id`] — `sha256(orig_name || new_name || patch)[..16]`, stable
//!   across sessions for a given snapshot pair.

pub mod error;
mod expand;
pub mod file_diff;
mod parse;
pub mod unidiff;

pub use error::DiffError;
pub use file_diff::{hunk_id, FileDiff, Hunk};
pub use unidiff::Unidiff;
