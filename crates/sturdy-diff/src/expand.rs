// expand.rs — Split context-grouped hunks into per-edit hunks.
//
// git groups nearby edits into one hunk joined by interior context lines.
// Per-hunk selection in reviews needs the opposite: each hunk must concern
// exactly one contiguous edit region. This pass splits a hunk at its
// interior context, keeping up to three bounding context lines per side and
// recomputing the `@@` ranges against the original file, so every produced
// hunk still applies on its own.

use crate::parse::RawHunk;

const CONTEXT_LINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Context,
    Del,
    Add,
    /// `\ No newline at end of file` — belongs to the preceding line.
    Meta,
}

fn classify(line: &str) -> Kind {
    match line.chars().next() {
        Some('-') => Kind::Del,
        Some('+') => Kind::Add,
        Some('\\') => Kind::Meta,
        _ => Kind::Context,
    }
}

pub(crate) fn expand_hunk(hunk: &RawHunk) -> Vec<RawHunk> {
    let kinds: Vec<Kind> = hunk.lines.iter().map(|l| classify(l)).collect();

    // Old/new line numbers at each body index, before the line is consumed.
    let mut positions = Vec::with_capacity(kinds.len());
    let mut old_line = hunk.old_start;
    let mut new_line = hunk.new_start;
    for kind in &kinds {
        positions.push((old_line, new_line));
        match kind {
            Kind::Context => {
                old_line += 1;
                new_line += 1;
            }
            Kind::Del => old_line += 1,
            Kind::Add => new_line += 1,
            Kind::Meta => {}
        }
    }

    // Maximal runs of edit lines (a Meta line rides with its predecessor).
    let mut runs: Vec<(usize, usize)> = Vec::new();
    let mut i = 0;
    while i < kinds.len() {
        if matches!(kinds[i], Kind::Del | Kind::Add) {
            let start = i;
            while i < kinds.len() && matches!(kinds[i], Kind::Del | Kind::Add | Kind::Meta) {
                i += 1;
            }
            runs.push((start, i));
        } else {
            i += 1;
        }
    }

    if runs.len() <= 1 {
        return vec![hunk.clone()];
    }

    runs.iter()
        .map(|&(start, end)| {
            // Bounding context. Only plain context lines qualify; a Meta
            // line directly after the run is kept with it.
            let mut from = start;
            let mut taken = 0;
            while from > 0 && taken < CONTEXT_LINES && kinds[from - 1] == Kind::Context {
                from -= 1;
                taken += 1;
            }

            let mut to = end;
            let mut taken = 0;
            while to < kinds.len() && taken < CONTEXT_LINES && kinds[to] == Kind::Context {
                to += 1;
                taken += 1;
            }

            let lines: Vec<String> = hunk.lines[from..to].to_vec();
            let old_count = kinds[from..to]
                .iter()
                .filter(|k| matches!(k, Kind::Context | Kind::Del))
                .count();
            let new_count = kinds[from..to]
                .iter()
                .filter(|k| matches!(k, Kind::Context | Kind::Add))
                .count();

            let (mut old_start, mut new_start) = positions[from];
            if old_count == 0 {
                old_start = old_start.saturating_sub(1);
            }
            if new_count == 0 {
                new_start = new_start.saturating_sub(1);
            }

            RawHunk {
                old_start,
                old_count,
                new_start,
                new_count,
                section: String::new(),
                lines,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hunk(old_start: usize, new_start: usize, body: &[&str]) -> RawHunk {
        let old_count = body
            .iter()
            .filter(|l| matches!(classify(l), Kind::Context | Kind::Del))
            .count();
        let new_count = body
            .iter()
            .filter(|l| matches!(classify(l), Kind::Context | Kind::Add))
            .count();
        RawHunk {
            old_start,
            old_count,
            new_start,
            new_count,
            section: String::new(),
            lines: body.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[test]
    fn single_edit_region_stays_intact() {
        let h = hunk(1, 1, &[" a", "-b", "+B", " c"]);
        let out = expand_hunk(&h);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].lines, h.lines);
    }

    #[test]
    fn two_regions_split_into_two_hunks() {
        let h = hunk(
            1,
            1,
            &[
                " l1", "-l2", "+L2", " l3", " l4", " l5", "-l6", "+L6", " l7",
            ],
        );
        let out = expand_hunk(&h);
        assert_eq!(out.len(), 2);

        let first = &out[0];
        assert_eq!(
            (first.old_start, first.old_count, first.new_start, first.new_count),
            (1, 5, 1, 5)
        );
        assert_eq!(first.lines, vec![" l1", "-l2", "+L2", " l3", " l4", " l5"]);

        let second = &out[1];
        assert_eq!(
            (second.old_start, second.old_count, second.new_start, second.new_count),
            (3, 5, 3, 5)
        );
        assert_eq!(second.lines, vec![" l3", " l4", " l5", "-l6", "+L6", " l7"]);
    }

    #[test]
    fn no_interior_context_in_any_output_hunk() {
        let h = hunk(
            10,
            10,
            &[
                " c1", " c2", "+a1", " c3", " c4", " c5", " c6", " c7", "-d1", " c8",
            ],
        );
        for out in expand_hunk(&h) {
            // Context only at the edges.
            let kinds: Vec<Kind> = out.lines.iter().map(|l| classify(l)).collect();
            let first_edit = kinds
                .iter()
                .position(|k| matches!(k, Kind::Del | Kind::Add))
                .unwrap();
            let last_edit = kinds
                .iter()
                .rposition(|k| matches!(k, Kind::Del | Kind::Add))
                .unwrap();
            assert!(kinds[first_edit..=last_edit]
                .iter()
                .all(|k| !matches!(k, Kind::Context)));
        }
    }

    #[test]
    fn insertion_with_no_old_lines_uses_previous_line_number() {
        // Pure insertions separated by lots of context.
        let h = hunk(
            1,
            1,
            &[
                "+top", " k1", " k2", " k3", " k4", " k5", " k6", " k7", "+bottom",
            ],
        );
        let out = expand_hunk(&h);
        assert_eq!(out.len(), 2);

        // First insertion sits before old line 1 with three context lines
        // after it.
        assert_eq!(out[0].old_start, 1);
        assert_eq!(out[0].old_count, 3);
        assert_eq!(out[0].new_count, 4);

        // Second insertion comes after the trailing context.
        assert_eq!(out[1].old_count, 3);
        assert_eq!(out[1].new_count, 4);
        assert_eq!(out[1].old_start, 5);
    }

    #[test]
    fn no_newline_marker_stays_with_its_run() {
        let h = hunk(
            1,
            1,
            &[
                "-a", "+A", " k1", " k2", " k3", " k4", "-z", "+Z", "\\ No newline at end of file",
            ],
        );
        let out = expand_hunk(&h);
        assert_eq!(out.len(), 2);
        assert_eq!(
            out[1].lines.last().unwrap(),
            "\\ No newline at end of file"
        );
    }
}
