use similar::{ChangeTag, DiffTag, TextDiff};

/// A contiguous region of changed lines between two versions of a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// Starting line number in the old file (1-based)
    pub old_start: usize,
    /// Number of lines removed from the old file
    pub old_count: usize,
    /// Starting line number in the new file (1-based)
    pub new_start: usize,
    /// Number of lines added in the new file
    pub new_count: usize,
    /// Lines prefixed with '-' (removed) or '+' (added)
    pub lines: Vec<String>,
}

impl Hunk {
    /// Unified diff header, e.g. `@@ -3,2 +3,4 @@`.
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_count, self.new_start, self.new_count
        )
    }
}

/// Line diff between `old` and `new`, one hunk per run of changed lines.
pub fn diff_lines(old: &str, new: &str) -> Vec<Hunk> {
    let diff = TextDiff::from_lines(old, new);
    diff.grouped_ops(0)
        .iter()
        .filter(|group| group.iter().any(|op| op.tag() != DiffTag::Equal))
        .map(|group| {
            let (first, last) = (&group[0], &group[group.len() - 1]);
            let old_range = first.old_range().start..last.old_range().end;
            let new_range = first.new_range().start..last.new_range().end;
            let lines = group
                .iter()
                .flat_map(|op| diff.iter_changes(op))
                .filter_map(|change| {
                    let sign = match change.tag() {
                        ChangeTag::Delete => '-',
                        ChangeTag::Insert => '+',
                        ChangeTag::Equal => return None,
                    };
                    Some(format!("{sign}{}", change.value().trim_end_matches(['\n', '\r'])))
                })
                .collect();
            Hunk {
                old_start: old_range.start + 1,
                old_count: old_range.len(),
                new_start: new_range.start + 1,
                new_count: new_range.len(),
                lines,
            }
        })
        .collect()
}
