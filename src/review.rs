use std::path::Path;
use thiserror::Error;
use tracing::{info, instrument};

use crate::github::{Category, GhError, GhRunner, GitHub, IssueRecord};
use crate::markdown::detect::repo_from_url;
use crate::markdown::{format_reference, read_section, replace_section};
use crate::note::{self, NoteError, Outcome};
use crate::period::DateWindow;

/// Heading of the auto-generated section in daily notes.
pub const DEFAULT_SECTION: &str = "Daily Review";

/// Placeholder for a category without records.
const EMPTY_GROUP: &str = "NONE";

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    Fetch(#[from] GhError),

    #[error(transparent)]
    Note(#[from] NoteError),
}

/// GitHub activity of one window, grouped by category in display order.
#[derive(Debug, Default)]
pub struct Activity {
    pub groups: Vec<(Category, Vec<IssueRecord>)>,
    /// Several repositories were queried, so numbers alone are ambiguous
    pub multi_repo: bool,
}

/// Fetch every category. The first failing query aborts the whole review.
pub async fn collect<R: GhRunner>(
    gh: &GitHub<R>,
    repos: &[String],
    window: DateWindow,
) -> Result<Activity, GhError> {
    let mut activity = Activity {
        multi_repo: repos.len() > 1,
        ..Activity::default()
    };
    for category in Category::ALL {
        let records = gh.fetch(category, repos, window).await?;
        activity.groups.push((category, records));
    }
    Ok(activity)
}

/// Render the section body: a label line per category followed by one
/// bullet per record (or NONE), groups separated by a blank line.
pub fn render(activity: &Activity) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, (category, records)) in activity.groups.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        lines.push(category.label().to_string());
        if records.is_empty() {
            lines.push(EMPTY_GROUP.to_string());
        }
        lines.extend(records.iter().map(|r| {
            match repo_from_url(&r.url).filter(|_| activity.multi_repo) {
                Some(repo) => format!("- {repo} {}", format_reference(r)),
                None => format!("- {}", format_reference(r)),
            }
        }));
    }
    lines
}

/// Refresh section `section` of the note at `path` with activity in `window`.
#[instrument(skip(gh, repos, path, window), fields(path = %path.display(), window = %window.to_query()))]
pub async fn update_note<R: GhRunner>(
    gh: &GitHub<R>,
    path: &Path,
    section: &str,
    repos: &[String],
    window: DateWindow,
    dry_run: bool,
) -> Result<Outcome, ReviewError> {
    let content = note::read(path)?;
    let activity = collect(gh, repos, window).await?;
    let lines = render(&activity);

    let previous = read_section(&content, section).map_or(0, |body| body.len());
    let update = replace_section(&content, section, &lines);
    if update.appended {
        info!(rendered = lines.len(), "section missing, appended");
    } else {
        info!(previous, rendered = lines.len(), "replaced section");
    }
    Ok(note::apply(path, &content, &update.content, dry_run)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::testing::{github, FakeGh};
    use crate::github::IssueState;
    use chrono::NaiveDate;
    use std::fs;

    fn record(id: u64, title: &str, state: IssueState) -> IssueRecord {
        IssueRecord {
            id,
            title: title.to_string(),
            url: format!("http://test.com/{id}"),
            state,
        }
    }

    fn day() -> DateWindow {
        DateWindow::single(NaiveDate::from_ymd_opt(2024, 3, 14).unwrap())
    }

    fn quiet_gh() -> FakeGh {
        FakeGh::new()
            .respond("api user", r#"{"login": "me"}"#)
            .respond("issue list", "[]")
            .respond("pr list", "[]")
    }

    #[test]
    fn test_render_empty_groups() {
        let activity = Activity {
            groups: Category::ALL.iter().map(|c| (*c, Vec::new())).collect(),
            multi_repo: false,
        };
        let lines = render(&activity);
        assert_eq!(lines.iter().filter(|l| *l == "NONE").count(), 5);
        assert_eq!(lines[0], "**Issues created:**");
        assert_eq!(lines.last().map(String::as_str), Some("NONE"));
    }

    #[test]
    fn test_render_records() {
        let activity = Activity {
            groups: vec![
                (Category::IssuesCreated, vec![record(1, "Created Issue", IssueState::Open)]),
                (Category::IssuesClosed, vec![record(3, "Closed Issue", IssueState::Closed)]),
            ],
            multi_repo: false,
        };
        assert_eq!(
            render(&activity),
            vec![
                "**Issues created:**",
                "- [#1 Created Issue](http://test.com/1)",
                "",
                "**Issues closed:**",
                "- [#3 Closed Issue](http://test.com/3) ✅",
            ]
        );
    }

    #[test]
    fn test_render_names_repo_when_several_are_queried() {
        let same_number = |repo: &str, title: &str| IssueRecord {
            id: 1,
            title: title.to_string(),
            url: format!("https://github.com/{repo}/issues/1"),
            state: IssueState::Open,
        };
        let activity = Activity {
            groups: vec![(
                Category::IssuesCreated,
                vec![same_number("o/a", "A"), same_number("o/b", "B")],
            )],
            multi_repo: true,
        };
        assert_eq!(
            render(&activity),
            vec![
                "**Issues created:**",
                "- o/a [#1 A](https://github.com/o/a/issues/1)",
                "- o/b [#1 B](https://github.com/o/b/issues/1)",
            ]
        );
    }

    #[tokio::test]
    async fn test_collect_flags_multiple_repos() {
        let gh = github(quiet_gh());
        let single = collect(&gh, &["o/r".to_string()], day()).await.unwrap();
        assert!(!single.multi_repo);
        let several = collect(&gh, &["o/r".to_string(), "o/s".to_string()], day()).await.unwrap();
        assert!(several.multi_repo);
    }

    #[tokio::test]
    async fn test_collect_queries_every_category() {
        let gh = github(quiet_gh());
        let activity = collect(&gh, &["o/r".to_string()], day()).await.unwrap();
        assert_eq!(activity.groups.len(), 5);
        // five list calls plus one login lookup for closed issues
        assert_eq!(gh.runner().call_count(), 6);
    }

    #[tokio::test]
    async fn test_update_note_replaces_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2024-03-14.md");
        fs::write(&path, "# 2024-03-14\n\n## Daily Review\n\nOld content here\n\n## Notes\n\nkeep me\n").unwrap();

        let gh = github(
            FakeGh::new()
                .respond("api user", r#"{"login": "me"}"#)
                .respond(
                    "issue list --repo o/r --state all --limit 100 --search author:@me created",
                    r#"[{"number": 1, "title": "Fix bug", "url": "https://github.com/o/r/issues/1",
                         "state": "CLOSED", "createdAt": "2024-03-14T08:00:00Z"}]"#,
                )
                .respond("issue list", "[]")
                .respond("pr list", "[]"),
        );
        let outcome = update_note(&gh, &path, DEFAULT_SECTION, &["o/r".to_string()], day(), false)
            .await
            .unwrap();
        assert!(outcome.written);

        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("Old content here"));
        assert!(content.contains("## Notes\n\nkeep me\n"));
        let body = read_section(&content, DEFAULT_SECTION).unwrap();
        assert_eq!(body[1], "- [#1 Fix bug](https://github.com/o/r/issues/1) ✅");
    }

    #[tokio::test]
    async fn test_update_note_appends_missing_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.md");
        fs::write(&path, "# Some Title\n\nSome existing content").unwrap();

        let gh = github(quiet_gh());
        update_note(&gh, &path, DEFAULT_SECTION, &["o/r".to_string()], day(), false)
            .await
            .unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Some Title\n\nSome existing content\n\n## Daily Review\n\n"));
        assert_eq!(content.matches("NONE").count(), 5);
    }

    #[tokio::test]
    async fn test_dry_run_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.md");
        fs::write(&path, "## Daily Review\n\n## Notes\n").unwrap();

        let gh = github(quiet_gh());
        let outcome = update_note(&gh, &path, DEFAULT_SECTION, &["o/r".to_string()], day(), true)
            .await
            .unwrap();
        assert!(!outcome.written);
        assert!(outcome.changed);
        assert_eq!(fs::read_to_string(&path).unwrap(), "## Daily Review\n\n## Notes\n");
    }

    #[tokio::test]
    async fn test_missing_note_fails_before_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let gh = github(quiet_gh());
        let err = update_note(&gh, &dir.path().join("nope.md"), DEFAULT_SECTION, &["o/r".to_string()], day(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::Note(NoteError::Missing(_))));
        assert_eq!(gh.runner().call_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_note_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.md");
        fs::write(&path, "## Daily Review\nold\n").unwrap();

        let gh = github(FakeGh::new().fail("issue list", "gh: not logged in"));
        let err = update_note(&gh, &path, DEFAULT_SECTION, &["o/r".to_string()], day(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::Fetch(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), "## Daily Review\nold\n");
    }
}
