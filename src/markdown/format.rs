use crate::github::IssueRecord;

/// Glyph appended to references of closed or merged items.
pub const CHECKMARK: &str = "✅";

/// Render a record as `[#id title](url)`, with a trailing checkmark when
/// the item is closed or merged.
pub fn format_reference(record: &IssueRecord) -> String {
    let mut out = format!(
        "[#{} {}]({})",
        record.id,
        escape_markdown(&record.title),
        record.url
    );
    if record.state.is_done() {
        out.push(' ');
        out.push_str(CHECKMARK);
    }
    out
}

/// Backslash-escape characters that would break out of link text or start
/// emphasis/code spans.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '[' | ']' | '*' | '_' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::IssueState;

    fn record(id: u64, title: &str, state: IssueState) -> IssueRecord {
        IssueRecord {
            id,
            title: title.to_string(),
            url: format!("https://github.com/owner/repo/issues/{id}"),
            state,
        }
    }

    #[test]
    fn test_format_open_issue() {
        assert_eq!(
            format_reference(&record(42, "Answer everything", IssueState::Open)),
            "[#42 Answer everything](https://github.com/owner/repo/issues/42)"
        );
    }

    #[test]
    fn test_format_closed_and_merged_get_checkmark() {
        assert_eq!(
            format_reference(&record(1, "Fix bug", IssueState::Closed)),
            "[#1 Fix bug](https://github.com/owner/repo/issues/1) ✅"
        );
        assert!(format_reference(&record(2, "Ship", IssueState::Merged)).ends_with(" ✅"));
    }

    #[test]
    fn test_format_escapes_title() {
        assert_eq!(
            format_reference(&record(123, "Fix *bold* issue with [links]", IssueState::Open)),
            r"[#123 Fix \*bold\* issue with \[links\]](https://github.com/owner/repo/issues/123)"
        );
    }

    #[test]
    fn test_format_is_deterministic() {
        let r = record(9, "Add `code` support", IssueState::Closed);
        assert_eq!(format_reference(&r), format_reference(&r.clone()));
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown(""), "");
        assert_eq!(escape_markdown("plain text"), "plain text");
        assert_eq!(escape_markdown(r"a\b_c`d"), r"a\\b\_c\`d");
    }
}
