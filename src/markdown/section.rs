/// Result of splicing rendered lines into a named section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionUpdate {
    /// Full file content after the update
    pub content: String,
    /// True when the heading was missing and a new section was appended
    pub appended: bool,
}

/// Heading text of an ATX heading line (`## Title` → `Title`), or None.
pub fn heading_text(line: &str) -> Option<&str> {
    let trimmed = line.trim_start_matches(' ');
    if line.len() - trimmed.len() > 3 {
        return None;
    }
    let level = trimmed.bytes().take_while(|b| *b == b'#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
        return None;
    }
    let text = rest.trim();
    // a closing `#` run counts only when separated by whitespace
    let stripped = text.trim_end_matches('#');
    if stripped.is_empty() {
        Some("")
    } else if stripped.ends_with([' ', '\t']) {
        Some(stripped.trim_end())
    } else {
        Some(text)
    }
}

/// Byte offsets of every line start, plus the content length.
fn line_starts(content: &str) -> Vec<usize> {
    let mut starts = vec![0];
    starts.extend(content.match_indices('\n').map(|(i, _)| i + 1));
    if starts.last() != Some(&content.len()) {
        starts.push(content.len());
    }
    starts
}

/// Locate a section: returns (byte offset just past the heading line,
/// byte offset of the next heading line or EOF). Headings inside fenced
/// code blocks are ignored.
fn locate(content: &str, name: &str) -> Option<(usize, usize)> {
    let starts = line_starts(content);
    let mut fences = Fences::default();
    let mut body_start = None;

    for pair in starts.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let line = content[start..end].trim_end_matches(['\n', '\r']);
        if fences.skip(line) {
            continue;
        }
        let Some(text) = heading_text(line) else {
            continue;
        };
        match body_start {
            None if text == name => body_start = Some(end),
            Some(body) => return Some((body, start)),
            None => {}
        }
    }
    body_start.map(|body| (body, content.len()))
}

/// Line-by-line tracker of fenced code blocks.
///
/// A block opened by a run of n backticks (or tildes) closes only on a line
/// holding a run of at least n of the same character and nothing else.
#[derive(Debug, Default)]
pub(crate) struct Fences {
    open: Option<(u8, usize)>,
}

impl Fences {
    /// Feed the next line. True when it is a fence line or inside a block.
    pub(crate) fn skip(&mut self, line: &str) -> bool {
        match (self.open, fence_marker(line)) {
            (None, Some((ch, len, _))) => {
                self.open = Some((ch, len));
                true
            }
            (None, None) => false,
            (Some((open_ch, open_len)), Some((ch, len, true))) if ch == open_ch && len >= open_len => {
                self.open = None;
                true
            }
            (Some(_), _) => true,
        }
    }
}

/// Fence character, run length and whether only whitespace follows the run.
fn fence_marker(line: &str) -> Option<(u8, usize, bool)> {
    let trimmed = line.trim_start();
    let ch = *trimmed.as_bytes().first()?;
    if ch != b'`' && ch != b'~' {
        return None;
    }
    let len = trimmed.bytes().take_while(|b| *b == ch).count();
    if len < 3 {
        return None;
    }
    Some((ch, len, trimmed[len..].trim().is_empty()))
}

/// Replace the body of section `name` with `lines`.
///
/// The body becomes a blank line, the rendered lines, and a blank line
/// before the following heading. When no heading matches, `## name` and the
/// lines are appended at the end of the file.
pub fn replace_section(content: &str, name: &str, lines: &[String]) -> SectionUpdate {
    let Some((body_start, body_end)) = locate(content, name) else {
        return SectionUpdate {
            content: append_section(content, name, lines),
            appended: true,
        };
    };

    let mut out = String::with_capacity(content.len() + lines.iter().map(|l| l.len() + 1).sum::<usize>());
    out.push_str(&content[..body_start]);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    let rest = &content[body_end..];
    if !rest.is_empty() {
        if !lines.is_empty() {
            out.push('\n');
        }
        out.push_str(rest);
    }
    SectionUpdate {
        content: out,
        appended: false,
    }
}

fn append_section(content: &str, name: &str, lines: &[String]) -> String {
    let mut out = content.trim_end_matches(['\n', '\r', ' ']).to_string();
    if !out.is_empty() {
        out.push_str("\n\n");
    }
    out.push_str("## ");
    out.push_str(name);
    out.push_str("\n\n");
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Body lines of section `name` without leading/trailing blank lines.
pub fn read_section(content: &str, name: &str) -> Option<Vec<String>> {
    let (start, end) = locate(content, name)?;
    let lines: Vec<&str> = content[start..end].lines().collect();
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    Some(match (first, last) {
        (Some(first), Some(last)) => lines[first..=last].iter().map(|l| l.to_string()).collect(),
        _ => Vec::new(),
    })
}
