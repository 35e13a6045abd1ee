// unidiff.rs — Decorates raw git diff output into client-facing FileDiffs.

use crate::error::DiffError;
use crate::expand::expand_hunk;
use crate::file_diff::{hunk_id, FileDiff, Hunk};
use crate::parse::{parse, RawFileDiff};

/// Builder over one raw diff.
///
/// ```
/// use sturdy_diff::Unidiff;
///
/// let raw = "diff --git a/f.txt b/f.txt\n\
/// --- a/f.txt\n\
/// +++ b/f.txt\n\
/// @@ -1 +1 @@\n\
/// -old\n\
/// +new\n";
/// let diffs = Unidiff::new(raw).with_expanded_hunks().decorate().unwrap();
/// assert_eq!(diffs[0].preferred_name, "f.txt");
/// ```
pub struct Unidiff {
    raw: String,
    expanded: bool,
    ignore_binary: bool,
}

impl Unidiff {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            expanded: false,
            ignore_binary: false,
        }
    }

    /// Split context-grouped hunks so each hunk holds one contiguous edit
    /// region. Required for per-hunk selection.
    pub fn with_expanded_hunks(mut self) -> Self {
        self.expanded = true;
        self
    }

    /// Drop binary file diffs from the output.
    pub fn with_ignore_binary(mut self) -> Self {
        self.ignore_binary = true;
        self
    }

    pub fn decorate(self) -> Result<Vec<FileDiff>, DiffError> {
        let files = parse(&self.raw)?;
        let mut out = Vec::with_capacity(files.len());

        for file in files {
            if file.is_binary && self.ignore_binary {
                continue;
            }
            out.push(self.decorate_file(file));
        }
        Ok(out)
    }

    fn decorate_file(&self, file: RawFileDiff) -> FileDiff {
        let orig_name = file.orig_name.clone();
        let new_name = file.new_name.clone();
        let preferred_name = new_name
            .clone()
            .or_else(|| orig_name.clone())
            .unwrap_or_default();

        let hunks = if file.is_binary {
            vec![Hunk {
                id: hunk_id(orig_name.as_deref(), new_name.as_deref(), ""),
                patch: String::new(),
                is_outdated: false,
                is_applied: false,
                is_dismissed: false,
            }]
        } else {
            let raw_hunks: Vec<_> = if self.expanded {
                file.hunks.iter().flat_map(expand_hunk).collect()
            } else {
                file.hunks.clone()
            };

            raw_hunks
                .iter()
                .map(|raw| {
                    let patch = file.hunk_patch(raw);
                    Hunk {
                        id: hunk_id(orig_name.as_deref(), new_name.as_deref(), &patch),
                        patch,
                        is_outdated: false,
                        is_applied: false,
                        is_dismissed: false,
                    }
                })
                .collect()
        };

        FileDiff {
            orig_name,
            new_name,
            preferred_name,
            is_new: file.is_new,
            is_deleted: file.is_deleted,
            is_moved: file.is_moved,
            is_binary: file.is_binary,
            hunks,
        }
    }
}
