// parse.rs — Parser for raw `git diff` output.
//
// The parser splits the stream into per-file sections on `diff --git`
// lines, collects each section's header verbatim (so hunk patches can be
// reconstructed as standalone applicable patches), and splits the body on
// `@@` hunk headers.

use crate::error::DiffError;

/// One `@@` section of a file diff.
#[derive(Debug, Clone)]
pub(crate) struct RawHunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    /// Trailing section text of the `@@` line, including its leading space.
    pub section: String,
    /// Body lines with their prefix character, in order.
    pub lines: Vec<String>,
}

impl RawHunk {
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@{}",
            self.old_start, self.old_count, self.new_start, self.new_count, self.section
        )
    }
}

/// One file's section of a raw diff.
#[derive(Debug, Clone)]
pub(crate) struct RawFileDiff {
    /// Header lines from `diff --git` up to the first hunk, verbatim.
    pub header: Vec<String>,
    pub orig_name: Option<String>,
    pub new_name: Option<String>,
    pub is_new: bool,
    pub is_deleted: bool,
    pub is_moved: bool,
    pub is_binary: bool,
    pub hunks: Vec<RawHunk>,
}

impl RawFileDiff {
    /// A standalone patch containing the file header and exactly one hunk.
    pub fn hunk_patch(&self, hunk: &RawHunk) -> String {
        let mut patch = String::new();
        for line in &self.header {
            patch.push_str(line);
            patch.push('\n');
        }
        patch.push_str(&hunk.header());
        patch.push('\n');
        for line in &hunk.lines {
            patch.push_str(line);
            patch.push('\n');
        }
        patch
    }
}

pub(crate) fn parse(raw: &str) -> Result<Vec<RawFileDiff>, DiffError> {
    let mut files: Vec<RawFileDiff> = Vec::new();

    for (index, line) in raw.lines().enumerate() {
        let line_number = index + 1;

        if let Some(rest) = line.strip_prefix("diff --git ") {
            let (orig, new) = split_git_names(rest);
            files.push(RawFileDiff {
                header: vec![line.to_string()],
                orig_name: orig,
                new_name: new,
                is_new: false,
                is_deleted: false,
                is_moved: false,
                is_binary: false,
                hunks: Vec::new(),
            });
            continue;
        }

        let Some(file) = files.last_mut() else {
            if line.trim().is_empty() {
                continue;
            }
            return Err(DiffError::malformed(
                line_number,
                "content before first file header",
            ));
        };

        if let Some(header) = line.strip_prefix("@@ ") {
            let hunk = parse_hunk_header(header, line_number)?;
            file.hunks.push(hunk);
            continue;
        }

        if let Some(current) = file.hunks.last_mut() {
            // Hunk body.
            match line.chars().next() {
                Some(' ') | Some('+') | Some('-') | Some('\\') => {
                    current.lines.push(line.to_string())
                }
                // A context line whose content is empty.
                None => current.lines.push(" ".to_string()),
                Some(_) => {
                    return Err(DiffError::malformed(line_number, "unexpected hunk line"))
                }
            }
            continue;
        }

        // Still in the file header.
        file.header.push(line.to_string());
        if let Some(name) = line.strip_prefix("rename from ") {
            file.is_moved = true;
            file.orig_name = Some(name.to_string());
        } else if let Some(name) = line.strip_prefix("rename to ") {
            file.new_name = Some(name.to_string());
        } else if line.starts_with("new file mode ") {
            file.is_new = true;
            file.orig_name = None;
        } else if line.starts_with("deleted file mode ") {
            file.is_deleted = true;
            file.new_name = None;
        } else if let Some(name) = line.strip_prefix("--- ") {
            file.orig_name = parse_marker_name(name, "a/");
        } else if let Some(name) = line.strip_prefix("+++ ") {
            file.new_name = parse_marker_name(name, "b/");
        } else if line.starts_with("Binary files ") || line.starts_with("GIT binary patch") {
            file.is_binary = true;
        }
    }

    Ok(files)
}

/// Split the `a/<old> b/<new>` tail of a `diff --git` line.
fn split_git_names(rest: &str) -> (Option<String>, Option<String>) {
    let Some(stripped) = rest.strip_prefix("a/") else {
        return (None, None);
    };
    match stripped.find(" b/") {
        Some(at) => (
            Some(stripped[..at].to_string()),
            Some(stripped[at + 3..].to_string()),
        ),
        None => (None, None),
    }
}

/// Name from a `---`/`+++` marker; `/dev/null` means the side is absent.
fn parse_marker_name(name: &str, prefix: &str) -> Option<String> {
    let name = name.trim_end();
    if name == "/dev/null" {
        return None;
    }
    let name = name.trim_matches('"');
    Some(
        name.strip_prefix(prefix)
            .unwrap_or(name)
            .to_string(),
    )
}

fn parse_hunk_header(header: &str, line_number: usize) -> Result<RawHunk, DiffError> {
    // `-a[,b] +c[,d] @@[ section]`
    let end = header
        .find("@@")
        .ok_or_else(|| DiffError::malformed(line_number, "missing closing @@"))?;
    let ranges = header[..end].trim();
    let section = header[end + 2..].to_string();

    let mut parts = ranges.split_whitespace();
    let old = parts
        .next()
        .and_then(|p| p.strip_prefix('-'))
        .ok_or_else(|| DiffError::malformed(line_number, "missing old range"))?;
    let new = parts
        .next()
        .and_then(|p| p.strip_prefix('+'))
        .ok_or_else(|| DiffError::malformed(line_number, "missing new range"))?;

    let (old_start, old_count) = parse_range(old, line_number)?;
    let (new_start, new_count) = parse_range(new, line_number)?;

    Ok(RawHunk {
        old_start,
        old_count,
        new_start,
        new_count,
        section,
        lines: Vec::new(),
    })
}

fn parse_range(range: &str, line_number: usize) -> Result<(usize, usize), DiffError> {
    let (start, count) = match range.split_once(',') {
        Some((start, count)) => (start, count),
        None => (range, "1"),
    };
    let start = start
        .parse()
        .map_err(|_| DiffError::malformed(line_number, "bad range start"))?;
    let count = count
        .parse()
        .map_err(|_| DiffError::malformed(line_number, "bad range count"))?;
    Ok((start, count))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODIFY: &str = "diff --git a/f.txt b/f.txt\n\
index 000000..111111 100644\n\
--- a/f.txt\n\
+++ b/f.txt\n\
@@ -1,3 +1,3 @@\n \
one\n\
-two\n\
+TWO\n \
three\n";

    #[test]
    fn parses_a_simple_modification() {
        let files = parse(MODIFY).unwrap();
        assert_eq!(files.len(), 1);

        let file = &files[0];
        assert_eq!(file.orig_name.as_deref(), Some("f.txt"));
        assert_eq!(file.new_name.as_deref(), Some("f.txt"));
        assert!(!file.is_new && !file.is_deleted && !file.is_binary);

        assert_eq!(file.hunks.len(), 1);
        let hunk = &file.hunks[0];
        assert_eq!(
            (hunk.old_start, hunk.old_count, hunk.new_start, hunk.new_count),
            (1, 3, 1, 3)
        );
        assert_eq!(hunk.lines, vec![" one", "-two", "+TWO", " three"]);
    }

    #[test]
    fn hunk_patch_is_self_contained() {
        let files = parse(MODIFY).unwrap();
        let patch = files[0].hunk_patch(&files[0].hunks[0]);
        assert!(patch.starts_with("diff --git a/f.txt b/f.txt\n"));
        assert!(patch.contains("--- a/f.txt\n"));
        assert!(patch.contains("@@ -1,3 +1,3 @@\n"));
        assert!(patch.ends_with(" three\n"));
    }

    #[test]
    fn parses_a_new_file() {
        let raw = "diff --git a/new.txt b/new.txt\n\
new file mode 100644\n\
index 000000..111111\n\
--- /dev/null\n\
+++ b/new.txt\n\
@@ -0,0 +1,2 @@\n\
+hello\n\
+world\n";
        let files = parse(raw).unwrap();
        let file = &files[0];
        assert!(file.is_new);
        assert_eq!(file.orig_name, None);
        assert_eq!(file.new_name.as_deref(), Some("new.txt"));
        assert_eq!(files[0].hunks[0].old_count, 0);
    }

    #[test]
    fn parses_a_deleted_file() {
        let raw = "diff --git a/gone.txt b/gone.txt\n\
deleted file mode 100644\n\
index 111111..000000\n\
--- a/gone.txt\n\
+++ /dev/null\n\
@@ -1,1 +0,0 @@\n\
-bye\n";
        let files = parse(raw).unwrap();
        assert!(files[0].is_deleted);
        assert_eq!(files[0].new_name, None);
        assert_eq!(files[0].orig_name.as_deref(), Some("gone.txt"));
    }

    #[test]
    fn parses_a_rename() {
        let raw = "diff --git a/old.txt b/new.txt\n\
similarity index 100%\n\
rename from old.txt\n\
rename to new.txt\n";
        let files = parse(raw).unwrap();
        assert!(files[0].is_moved);
        assert_eq!(files[0].orig_name.as_deref(), Some("old.txt"));
        assert_eq!(files[0].new_name.as_deref(), Some("new.txt"));
        assert!(files[0].hunks.is_empty());
    }

    #[test]
    fn parses_binary_files() {
        let raw = "diff --git a/img.png b/img.png\n\
index 000000..111111 100644\n\
Binary files a/img.png and b/img.png differ\n";
        let files = parse(raw).unwrap();
        assert!(files[0].is_binary);
    }

    #[test]
    fn parses_multiple_files() {
        let raw = format!(
            "{MODIFY}diff --git a/other.txt b/other.txt\n\
--- a/other.txt\n\
+++ b/other.txt\n\
@@ -1 +1 @@\n\
-x\n\
+y\n"
        );
        let files = parse(&raw).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[1].preferred(), "other.txt");
    }

    #[test]
    fn empty_input_is_empty() {
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse("not a diff\n").is_err());
    }

    impl RawFileDiff {
        fn preferred(&self) -> &str {
            self.new_name
                .as_deref()
                .or(self.orig_name.as_deref())
                .unwrap_or("")
        }
    }
}
