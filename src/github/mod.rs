pub mod runner;
pub mod types;

pub use runner::{GhRunner, SubprocessRunner};
pub use types::{Category, IssueRecord, IssueState};

use chrono::{FixedOffset, Local};
use std::collections::HashSet;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::period::DateWindow;
use types::{ApiIssue, GhItem, Login};

#[derive(Debug, Error)]
pub enum GhError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    #[error("`{command}` exited with {}: {stderr}", exit_label(.code))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Malformed gh output for {what}: {source}")]
    Json {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("No repository given: pass --repo, set default_repo, or run inside a GitHub checkout")]
    NoRepository,
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

/// Issue-tracker access backed by the gh CLI.
pub struct GitHub<R: GhRunner> {
    runner: R,
    user: String,
    limit: u32,
    offset: FixedOffset,
    login: OnceCell<String>,
}

impl<R: GhRunner> GitHub<R> {
    /// `user` is a login or `@me`; timestamps are bucketed into local days.
    pub fn new(runner: R, user: impl Into<String>, limit: u32) -> Self {
        Self {
            runner,
            user: user.into(),
            limit,
            offset: *Local::now().offset(),
            login: OnceCell::new(),
        }
    }

    /// Bucket timestamps into days of `offset` instead of the local zone.
    #[cfg(test)]
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    #[cfg(test)]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Fetch every record of `category` in `window` across `repos`.
    ///
    /// Any gh failure aborts the whole fetch; no partial results are returned.
    /// Records outside the window are dropped even if gh returned them, and
    /// a record seen in an earlier repository is not repeated.
    #[instrument(skip(self, repos, window), fields(repos = repos.len(), window = %window.to_query()))]
    pub async fn fetch(
        &self,
        category: Category,
        repos: &[String],
        window: DateWindow,
    ) -> Result<Vec<IssueRecord>, GhError> {
        if repos.is_empty() {
            return Err(GhError::NoRepository);
        }

        let closer = match category {
            Category::IssuesClosed => Some(self.current_login().await?),
            _ => None,
        };

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        for repo in repos {
            let items = self.list(category, repo, window).await?;
            debug!(repo = %repo, returned = items.len(), "listed items");
            for item in items {
                let in_window = category
                    .timestamp(&item)
                    .is_some_and(|ts| window.contains(ts.with_timezone(&self.offset).date_naive()));
                if !in_window {
                    continue;
                }
                if let Some(login) = closer.as_deref() {
                    if !item.involves(login) {
                        continue;
                    }
                }
                let mut record = item.into_record();
                if category == Category::IssuesClosed {
                    record.state = IssueState::Closed;
                }
                if seen.insert(record.url.clone()) {
                    records.push(record);
                }
            }
        }
        debug!(kept = records.len(), "fetch complete");
        Ok(records)
    }

    async fn list(
        &self,
        category: Category,
        repo: &str,
        window: DateWindow,
    ) -> Result<Vec<GhItem>, GhError> {
        let args: Vec<String> = vec![
            category.subcommand().to_string(),
            "list".to_string(),
            "--repo".to_string(),
            repo.to_string(),
            "--state".to_string(),
            "all".to_string(),
            "--limit".to_string(),
            self.limit.to_string(),
            "--search".to_string(),
            category.search(&self.user, &window.to_search(self.offset)),
            "--json".to_string(),
            category.json_fields().to_string(),
        ];
        let stdout = self.runner.run(&args).await?;
        if stdout.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&stdout).map_err(|source| GhError::Json {
            what: format!("{} list in {repo}", category.subcommand()),
            source,
        })
    }

    /// Look up a single issue or pull request by number.
    #[instrument(skip(self))]
    pub async fn lookup(&self, repo: &str, number: u64) -> Result<IssueRecord, GhError> {
        let args = vec!["api".to_string(), format!("repos/{repo}/issues/{number}")];
        let stdout = self.runner.run(&args).await?;
        let issue: ApiIssue = serde_json::from_str(&stdout).map_err(|source| GhError::Json {
            what: format!("{repo}#{number}"),
            source,
        })?;
        Ok(issue.into_record())
    }

    /// The login search qualifiers refer to; resolves `@me` through gh once per run.
    pub async fn current_login(&self) -> Result<String, GhError> {
        if self.user != "@me" {
            return Ok(self.user.clone());
        }
        self.login
            .get_or_try_init(|| async {
                let stdout = self
                    .runner
                    .run(&["api".to_string(), "user".to_string()])
                    .await?;
                let user: Login = serde_json::from_str(&stdout).map_err(|source| GhError::Json {
                    what: "authenticated user".to_string(),
                    source,
                })?;
                debug!(login = %user.login, "resolved authenticated user");
                Ok::<_, GhError>(user.login)
            })
            .await
            .cloned()
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted gh stand-in: answers each call with the first response whose
    /// key occurs in the joined argument list, and records every call.
    #[derive(Default)]
    pub struct FakeGh {
        responses: Vec<(String, Result<String, String>)>,
        pub calls: Mutex<Vec<Vec<String>>>,
    }

    impl FakeGh {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(mut self, key: &str, stdout: &str) -> Self {
            self.responses.push((key.to_string(), Ok(stdout.to_string())));
            self
        }

        pub fn fail(mut self, key: &str, stderr: &str) -> Self {
            self.responses.push((key.to_string(), Err(stderr.to_string())));
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl GhRunner for FakeGh {
        async fn run(&self, args: &[String]) -> Result<String, GhError> {
            self.calls.lock().unwrap().push(args.to_vec());
            let joined = args.join(" ");
            match self.responses.iter().find(|(key, _)| joined.contains(key.as_str())) {
                Some((_, Ok(stdout))) => Ok(stdout.clone()),
                Some((_, Err(stderr))) => Err(GhError::Failed {
                    command: format!("gh {joined}"),
                    code: Some(1),
                    stderr: stderr.clone(),
                }),
                None => Err(GhError::Failed {
                    command: format!("gh {joined}"),
                    code: Some(1),
                    stderr: "no scripted response".to_string(),
                }),
            }
        }
    }

    pub fn github(fake: FakeGh) -> GitHub<FakeGh> {
        GitHub::new(fake, "@me", 100).with_offset(FixedOffset::east_opt(0).unwrap())
    }
}
