use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::github::{GhError, GhRunner, GitHub, IssueRecord};
use crate::markdown::detect::{self, find_bare_refs, find_unchecked_links, splice};
use crate::markdown::{format_reference, CHECKMARK};
use crate::note::{self, NoteError, Outcome};

#[derive(Debug, Error)]
pub enum RefsError {
    #[error(transparent)]
    Note(#[from] NoteError),

    #[error(transparent)]
    Repo(#[from] GhError),
}

/// A reference left as-is because its lookup failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    pub repo: String,
    pub number: u64,
    pub reason: String,
}

/// Summary of one formatting pass.
#[derive(Debug, Default)]
pub struct RefsReport {
    /// Bare references rewritten as links
    pub formatted: usize,
    /// Existing links that gained a checkmark
    pub checked: usize,
    pub unresolved: Vec<Unresolved>,
}

/// Memoised single-issue lookups for one pass.
struct Resolver<'a, R: GhRunner> {
    gh: &'a GitHub<R>,
    cache: HashMap<(String, u64), Result<IssueRecord, String>>,
}

impl<'a, R: GhRunner> Resolver<'a, R> {
    fn new(gh: &'a GitHub<R>) -> Self {
        Self {
            gh,
            cache: HashMap::new(),
        }
    }

    async fn resolve(&mut self, repo: &str, number: u64) -> Result<IssueRecord, String> {
        let key = (repo.to_string(), number);
        if let Some(hit) = self.cache.get(&key) {
            return hit.clone();
        }
        let result = self.gh.lookup(repo, number).await.map_err(|e| e.to_string());
        self.cache.insert(key, result.clone());
        result
    }
}

/// Rewrite bare references in `content` as formatted links and add
/// checkmarks to links whose item has since been closed or merged.
/// References that cannot be resolved stay untouched and are reported.
pub async fn format_content<R: GhRunner>(
    gh: &GitHub<R>,
    content: &str,
    repo: &str,
) -> (String, RefsReport) {
    let mut resolver = Resolver::new(gh);
    let mut report = RefsReport::default();
    let mut edits = Vec::new();

    for link in find_unchecked_links(content) {
        match resolver.resolve(&link.repo, link.number).await {
            Ok(record) if record.state.is_done() => {
                edits.push((link.insert_at..link.insert_at, format!(" {CHECKMARK}")));
                report.checked += 1;
            }
            Ok(_) => {}
            Err(reason) => report.unresolved.push(Unresolved {
                repo: link.repo,
                number: link.number,
                reason,
            }),
        }
    }

    for bare in find_bare_refs(content) {
        let target = bare.repo.as_deref().unwrap_or(repo);
        match resolver.resolve(target, bare.number).await {
            Ok(record) => {
                debug!(reference = %&content[bare.span.clone()], "formatting reference");
                edits.push((bare.span, format_reference(&record)));
                report.formatted += 1;
            }
            Err(reason) => report.unresolved.push(Unresolved {
                repo: target.to_string(),
                number: bare.number,
                reason,
            }),
        }
    }

    for miss in &report.unresolved {
        warn!(repo = %miss.repo, number = miss.number, reason = %miss.reason, "could not resolve reference");
    }
    (splice(content, edits), report)
}

/// Format references in the file at `path`.
///
/// The repository for unqualified references is `repo`, else the first
/// GitHub issue/PR link in the file, else whatever `fallback` yields.
#[instrument(skip(gh, path, fallback), fields(path = %path.display()))]
pub async fn update_file<R, F, Fut>(
    gh: &GitHub<R>,
    path: &Path,
    repo: Option<&str>,
    fallback: F,
    dry_run: bool,
) -> Result<(Outcome, RefsReport), RefsError>
where
    R: GhRunner,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Option<String>>,
{
    let content = note::read(path)?;
    let repo = match repo.map(String::from).or_else(|| detect::detect_repo(&content)) {
        Some(repo) => repo,
        None => fallback().await.ok_or(GhError::NoRepository)?,
    };
    info!(repo = %repo, "formatting references");

    let (formatted, report) = format_content(gh, &content, &repo).await;
    info!(
        formatted = report.formatted,
        checked = report.checked,
        unresolved = report.unresolved.len(),
        "references processed"
    );
    let outcome = note::apply(path, &content, &formatted, dry_run)?;
    Ok((outcome, report))
}
