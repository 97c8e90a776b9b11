//! Finding GitHub references in markdown text.
//!
//! Two kinds of reference are recognised:
//! - bare references (`#42`, `owner/repo#42`, `Issue #42`, `PR #42`) that
//!   are not inside a link, code span, fenced block or URL;
//! - already formatted links (`[#42 title](https://github.com/o/r/issues/42)`)
//!   that do not carry a checkmark yet.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;
use url::Url;

use super::section::Fences;

static BARE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\b(?:Issue|PR) )?(?:([A-Za-z0-9][A-Za-z0-9-]*/[A-Za-z0-9_.-]+))?#(\d+)\b")
        .expect("valid bare reference regex")
});

static LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!?\[(?:\\.|[^\]\\])*\]\([^)\s]*(?:\s+"[^"]*")?\)|<[a-z][a-z0-9+.-]*:[^>\s]*>|https?://[^\s)>\]]+"#)
        .expect("valid link regex")
});

static FORMATTED_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[#(\d+) (?:\\.|[^\]\\])*\]\((https://github\.com/[^/\s)]+/[^/\s)]+/(?:issues|pull)/\d+)\)( ✅)?")
        .expect("valid formatted link regex")
});

static LINK_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\]\((https?://[^)\s]+)\)").expect("valid link target regex"));

/// A bare reference and where it sits in the whole document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BareRef {
    /// Byte range of the text to replace, including any `Issue `/`PR ` prefix
    pub span: Range<usize>,
    /// Explicit `owner/repo` if the reference named one
    pub repo: Option<String>,
    pub number: u64,
}

/// A formatted link still missing its checkmark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UncheckedLink {
    /// Byte offset right after the closing `)` where ` ✅` goes
    pub insert_at: usize,
    pub repo: String,
    pub number: u64,
}

/// Call `f` with (byte offset, line) for every line outside fenced code blocks.
fn for_each_prose_line(content: &str, mut f: impl FnMut(usize, &str)) {
    let mut offset = 0;
    let mut fences = Fences::default();
    for raw in content.split_inclusive('\n') {
        let line = raw.trim_end_matches(['\n', '\r']);
        if !fences.skip(line) {
            f(offset, line);
        }
        offset += raw.len();
    }
}

/// Byte ranges within `line` that must not be scanned: code spans, links, URLs.
fn protected_ranges(line: &str) -> Vec<Range<usize>> {
    let mut ranges = code_spans(line);
    for m in LINK.find_iter(line) {
        if !ranges.iter().any(|r| r.contains(&m.start())) {
            ranges.push(m.range());
        }
    }
    ranges
}

/// Ranges of inline code spans: a run of n backticks up to the next run of exactly n.
fn code_spans(line: &str) -> Vec<Range<usize>> {
    let bytes = line.as_bytes();
    let run_at = |i: usize| bytes[i..].iter().take_while(|b| **b == b'`').count();
    let mut spans = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'`' {
            i += 1;
            continue;
        }
        let open = run_at(i);
        let mut j = i + open;
        let mut close = None;
        while j < bytes.len() {
            if bytes[j] == b'`' {
                let run = run_at(j);
                if run == open {
                    close = Some(j + run);
                    break;
                }
                j += run;
            } else {
                j += 1;
            }
        }
        match close {
            Some(end) => {
                spans.push(i..end);
                i = end;
            }
            None => i += open,
        }
    }
    spans
}

/// Find bare references that should become formatted links.
pub fn find_bare_refs(content: &str) -> Vec<BareRef> {
    let mut refs = Vec::new();
    for_each_prose_line(content, |offset, line| {
        let protected = protected_ranges(line);
        for caps in BARE_REF.captures_iter(line) {
            let Some(whole) = caps.get(0) else { continue };
            if protected.iter().any(|r| r.contains(&whole.start())) {
                continue;
            }
            let glued = line[..whole.start()]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '&' | '#' | '/' | '.' | '-'));
            if glued {
                continue;
            }
            let Some(number) = caps.get(2).and_then(|m| m.as_str().parse::<u64>().ok()) else {
                continue;
            };
            refs.push(BareRef {
                span: offset + whole.start()..offset + whole.end(),
                repo: caps.get(1).map(|m| m.as_str().to_string()),
                number,
            });
        }
    });
    refs
}

/// Find formatted GitHub links without a trailing checkmark.
pub fn find_unchecked_links(content: &str) -> Vec<UncheckedLink> {
    let mut links = Vec::new();
    for_each_prose_line(content, |offset, line| {
        let code = code_spans(line);
        for caps in FORMATTED_LINK.captures_iter(line) {
            let Some(whole) = caps.get(0) else { continue };
            if caps.get(3).is_some() || code.iter().any(|r| r.contains(&whole.start())) {
                continue;
            }
            let Some(url) = caps.get(2) else { continue };
            let Some((repo, number)) = parse_item_url(url.as_str()) else {
                continue;
            };
            links.push(UncheckedLink {
                insert_at: offset + whole.end(),
                repo,
                number,
            });
        }
    });
    links
}

/// Split a GitHub issue/PR URL into (`owner/repo`, number).
pub fn parse_item_url(url: &str) -> Option<(String, u64)> {
    let parsed = Url::parse(url).ok()?;
    if !matches!(parsed.host_str(), Some("github.com") | Some("www.github.com")) {
        return None;
    }
    let segments: Vec<_> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();
    if segments.len() != 4 || !matches!(segments[2], "issues" | "pull") {
        return None;
    }
    let number = segments[3].parse::<u64>().ok()?;
    Some((format!("{}/{}", segments[0], segments[1]), number))
}

/// `owner/repo` of any GitHub URL, e.g. `https://github.com/owner/repo/issues/1`.
pub fn repo_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if !matches!(parsed.host_str(), Some("github.com") | Some("www.github.com")) {
        return None;
    }
    let mut segments = parsed.path_segments()?.filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let repo = segments.next()?;
    Some(format!("{owner}/{repo}"))
}

/// Repository of the first GitHub issue/PR link in `content`.
pub fn detect_repo(content: &str) -> Option<String> {
    LINK_TARGET
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .find_map(|url| parse_item_url(url.as_str()).map(|(repo, _)| repo))
}

/// Apply non-overlapping replacements to `content`.
pub fn splice(content: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by_key(|(range, _)| range.start);
    let mut out = String::with_capacity(content.len());
    let mut cursor = 0;
    for (range, text) in edits {
        if range.start < cursor {
            continue;
        }
        out.push_str(&content[cursor..range.start]);
        out.push_str(&text);
        cursor = range.end;
    }
    out.push_str(&content[cursor..]);
    out
}
