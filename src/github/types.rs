use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Lifecycle state of an issue or pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueState {
    #[serde(alias = "open")]
    Open,
    #[serde(alias = "closed")]
    Closed,
    #[serde(alias = "merged")]
    Merged,
}

impl IssueState {
    /// Closed and merged items get a checkmark when rendered.
    pub fn is_done(self) -> bool {
        matches!(self, IssueState::Closed | IssueState::Merged)
    }
}

impl std::fmt::Display for IssueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueState::Open => write!(f, "open"),
            IssueState::Closed => write!(f, "closed"),
            IssueState::Merged => write!(f, "merged"),
        }
    }
}

/// One issue or pull request as rendered into a note.
/// Not Deserialize: built from `GhItem` (list output) or `ApiIssue` (single lookup).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRecord {
    /// Issue/PR number within its repository
    pub id: u64,
    pub title: String,
    /// Web URL of the issue/PR
    pub url: String,
    pub state: IssueState,
}

/// A row of `gh issue list` / `gh pr list` JSON output.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GhItem {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub state: IssueState,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author: Option<Login>,
    #[serde(default)]
    pub assignees: Vec<Login>,
}

impl GhItem {
    pub fn into_record(self) -> IssueRecord {
        IssueRecord {
            id: self.number,
            title: self.title,
            url: self.url,
            state: self.state,
        }
    }

    /// True when `login` authored the item or is assigned to it.
    pub fn involves(&self, login: &str) -> bool {
        self.author.as_ref().is_some_and(|a| a.login == login)
            || self.assignees.iter().any(|a| a.login == login)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Login {
    pub login: String,
}

/// Response of `gh api repos/{owner}/{repo}/issues/{n}`, which covers both
/// issues and pull requests.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiIssue {
    pub number: u64,
    pub title: String,
    pub html_url: String,
    /// REST API state: `open` or `closed`
    pub state: String,
    #[serde(default)]
    pub pull_request: Option<ApiPullRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiPullRef {
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
}

impl ApiIssue {
    pub fn into_record(self) -> IssueRecord {
        let merged = self
            .pull_request
            .as_ref()
            .is_some_and(|pr| pr.merged_at.is_some());
        let state = if merged {
            IssueState::Merged
        } else if self.state.eq_ignore_ascii_case("closed") {
            IssueState::Closed
        } else {
            IssueState::Open
        };
        IssueRecord {
            id: self.number,
            title: self.title,
            url: self.html_url,
            state,
        }
    }
}

/// Which slice of GitHub activity a query collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    IssuesCreated,
    PrsCreated,
    IssuesWorkedOn,
    IssuesClosed,
    PrsMerged,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::IssuesCreated,
        Category::PrsCreated,
        Category::IssuesClosed,
        Category::IssuesWorkedOn,
        Category::PrsMerged,
    ];

    /// gh subcommand: `issue` or `pr`.
    pub fn subcommand(self) -> &'static str {
        match self {
            Category::PrsCreated | Category::PrsMerged => "pr",
            _ => "issue",
        }
    }

    pub fn json_fields(self) -> &'static str {
        match self {
            Category::IssuesClosed => "number,title,url,state,closedAt,author,assignees",
            Category::PrsCreated | Category::PrsMerged => {
                "number,title,url,state,createdAt,mergedAt"
            }
            _ => "number,title,url,state,createdAt,updatedAt",
        }
    }

    /// Search qualifiers for `user` within `window` (already in query syntax).
    pub fn search(self, user: &str, window: &str) -> String {
        match self {
            Category::IssuesCreated | Category::PrsCreated => {
                format!("author:{user} created:{window}")
            }
            Category::IssuesWorkedOn => format!("involves:{user} updated:{window}"),
            Category::IssuesClosed => format!("closed:{window}"),
            Category::PrsMerged => format!("author:{user} merged:{window}"),
        }
    }

    /// The timestamp that decides whether an item belongs to the window.
    pub fn timestamp(self, item: &GhItem) -> Option<DateTime<Utc>> {
        match self {
            Category::IssuesCreated | Category::PrsCreated => item.created_at,
            Category::IssuesWorkedOn => item.updated_at,
            Category::IssuesClosed => item.closed_at,
            Category::PrsMerged => item.merged_at,
        }
    }

    /// Label line introducing the category in the daily review.
    pub fn label(self) -> &'static str {
        match self {
            Category::IssuesCreated => "**Issues created:**",
            Category::PrsCreated => "**PRs created:**",
            Category::IssuesClosed => "**Issues closed:**",
            Category::IssuesWorkedOn => "**Issues worked on:**",
            Category::PrsMerged => "**PRs merged:**",
        }
    }
}
