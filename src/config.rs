use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::github::{GhRunner, SubprocessRunner};
use crate::period::parse_day;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// Default config file, looked up in the current directory.
const CONFIG_FILE: &str = ".journal.toml";

/// Upper bound for the `git remote` lookup.
const GIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Top-level configuration loaded from .journal.toml.
/// Every field is optional; the tool works with zero config.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Root of the notes tree; daily notes live in `<notes_dir>/daily/`.
    #[serde(default = "default_notes_dir")]
    pub notes_dir: PathBuf,

    /// Fallback repository (`owner/repo`) when a command cannot infer one.
    #[serde(default)]
    pub default_repo: Option<String>,

    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub editor: EditorConfig,

    #[serde(default)]
    pub scripts: ScriptsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub login used in search qualifiers, `@me` for the authenticated user.
    pub user: String,
    /// Repositories queried for the daily review.
    pub repositories: Vec<String>,
    /// Path to the gh executable.
    pub gh_path: String,
    /// Seconds before a gh invocation is killed.
    pub timeout_secs: u64,
    /// Max results per gh list call.
    pub limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Obsidian vault name used in `obsidian://open` URIs.
    pub vault: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    /// Directory new task scripts are scaffolded into.
    pub dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notes_dir: default_notes_dir(),
            default_repo: None,
            github: GitHubConfig::default(),
            editor: EditorConfig::default(),
            scripts: ScriptsConfig::default(),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            user: "@me".to_string(),
            repositories: Vec::new(),
            gh_path: "gh".to_string(),
            timeout_secs: 30,
            limit: 100,
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            vault: "notes".to_string(),
        }
    }
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("scripts"),
        }
    }
}

fn default_notes_dir() -> PathBuf {
    PathBuf::from("~/notes")
}

impl Config {
    /// Load configuration from `$JOURNAL_CONFIG` or .journal.toml in the
    /// current directory, then apply `JOURNAL_*` environment overrides.
    /// Returns default config if no file exists.
    pub fn load() -> Result<Config, ConfigError> {
        let path = std::env::var_os("JOURNAL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
        let mut config = if path.exists() {
            debug!(path = %path.display(), "reading config file");
            Self::load_from(&path)?
        } else {
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.notes_dir = expand_home(&config.notes_dir, dirs::home_dir());
        Ok(config)
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Override fields from `JOURNAL_*` variables resolved through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("JOURNAL_NOTES_DIR").filter(|v| !v.is_empty()) {
            self.notes_dir = PathBuf::from(dir);
        }
        if let Some(repo) = lookup("JOURNAL_DEFAULT_REPO").filter(|v| !v.is_empty()) {
            self.default_repo = Some(repo);
        }
        if let Some(user) = lookup("JOURNAL_GITHUB_USER").filter(|v| !v.is_empty()) {
            self.github.user = user;
        }
        if let Some(repos) = lookup("JOURNAL_REPOSITORIES") {
            self.github.repositories = repos
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(String::from)
                .collect();
        }
    }

    /// Path of the daily note for `date` (`YYYY-MM-DD`).
    pub fn daily_note_path(&self, date: &str) -> Result<PathBuf, ConfigError> {
        if parse_day(date).is_none() {
            return Err(ConfigError::InvalidDate(date.to_string()));
        }
        Ok(self.notes_dir.join("daily").join(format!("{date}.md")))
    }

    /// Repositories the daily review queries: an explicit override wins,
    /// then the configured list, then the default/detected repository.
    pub async fn review_repositories(&self, repo_override: Option<&str>) -> Vec<String> {
        if let Some(repo) = repo_override {
            return vec![repo.to_string()];
        }
        if !self.github.repositories.is_empty() {
            return self.github.repositories.clone();
        }
        self.fallback_repo().await.into_iter().collect()
    }

    /// `default_repo`, or the GitHub `origin` remote of the current git checkout.
    pub async fn fallback_repo(&self) -> Option<String> {
        match self.default_repo.as_deref().filter(|r| !r.is_empty()) {
            Some(repo) => Some(repo.to_string()),
            None => detect_git_repo(&SubprocessRunner::new("git", GIT_TIMEOUT)).await,
        }
    }
}

fn expand_home(path: &Path, home: Option<PathBuf>) -> PathBuf {
    match (path.strip_prefix("~"), home) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

static GITHUB_REMOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:git@github\.com:|(?:https|ssh)://(?:git@)?(?:www\.)?github\.com/)([^/\s]+)/([^/\s]+?)(?:\.git)?/?$")
        .expect("valid remote regex")
});

/// Extract `owner/repo` from a GitHub remote URL (SSH or HTTPS form).
pub fn parse_github_remote(url: &str) -> Option<String> {
    let caps = GITHUB_REMOTE.captures(url.trim())?;
    Some(format!("{}/{}", &caps[1], &caps[2]))
}

async fn detect_git_repo(git: &impl GhRunner) -> Option<String> {
    let args = ["remote", "get-url", "origin"].map(String::from);
    let stdout = match git.run(&args).await {
        Ok(stdout) => stdout,
        Err(e) => {
            debug!(error = %e, "no git remote");
            return None;
        }
    };
    let repo = parse_github_remote(&stdout);
    debug!(repo = ?repo, "detected repository from git remote");
    repo
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::testing::FakeGh;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.github.user, "@me");
        assert!(config.github.repositories.is_empty());
        assert_eq!(config.github.gh_path, "gh");
        assert_eq!(config.github.timeout_secs, 30);
        assert_eq!(config.editor.vault, "notes");
        assert!(config.default_repo.is_none());
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_str = r#"
notes_dir = "/tmp/notes"
default_repo = "owner/repo"

[github]
repositories = ["owner/repo", "owner/other"]
timeout_secs = 5

[editor]
vault = "work"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.notes_dir, PathBuf::from("/tmp/notes"));
        assert_eq!(config.default_repo.as_deref(), Some("owner/repo"));
        assert_eq!(config.github.repositories.len(), 2);
        assert_eq!(config.github.timeout_secs, 5);
        // untouched keys in a present table keep their defaults
        assert_eq!(config.github.user, "@me");
        assert_eq!(config.editor.vault, "work");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".journal.toml");
        fs::write(&path, "default_repo = \"a/b\"\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.default_repo.as_deref(), Some("a/b"));
    }

    #[test]
    fn test_load_from_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".journal.toml");
        fs::write(&path, "notes_dir = [").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("JOURNAL_NOTES_DIR", "/data/notes"),
            ("JOURNAL_DEFAULT_REPO", "me/journal"),
            ("JOURNAL_GITHUB_USER", "octocat"),
            ("JOURNAL_REPOSITORIES", " a/b, ,c/d "),
        ]);
        let mut config = Config::default();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.notes_dir, PathBuf::from("/data/notes"));
        assert_eq!(config.default_repo.as_deref(), Some("me/journal"));
        assert_eq!(config.github.user, "octocat");
        assert_eq!(config.github.repositories, vec!["a/b", "c/d"]);
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = Config::default();
        config.apply_env(|key| (key == "JOURNAL_GITHUB_USER").then(String::new));
        assert_eq!(config.github.user, "@me");
    }

    #[test]
    fn test_daily_note_path() {
        let config = Config {
            notes_dir: PathBuf::from("/notes"),
            ..Config::default()
        };
        assert_eq!(
            config.daily_note_path("2023-12-15").unwrap(),
            PathBuf::from("/notes/daily/2023-12-15.md")
        );
        assert!(config.daily_note_path("../secret").is_err());
        assert!(config.daily_note_path("2023-02-31").is_err());
    }

    #[test]
    fn test_expand_home() {
        let home = Some(PathBuf::from("/home/me"));
        assert_eq!(
            expand_home(Path::new("~/notes"), home.clone()),
            PathBuf::from("/home/me/notes")
        );
        assert_eq!(expand_home(Path::new("/abs"), home), PathBuf::from("/abs"));
        assert_eq!(expand_home(Path::new("~/notes"), None), PathBuf::from("~/notes"));
    }

    #[test]
    fn test_expand_home_with_platform_home() {
        if let Some(home) = dirs::home_dir() {
            let expanded = expand_home(Path::new("~/notes"), Some(home.clone()));
            assert_eq!(expanded, home.join("notes"));
            assert!(!expanded.starts_with("~"));
        }
    }

    #[tokio::test]
    async fn test_review_repositories_precedence() {
        let mut config = Config {
            default_repo: Some("fallback/repo".to_string()),
            ..Config::default()
        };
        assert_eq!(config.review_repositories(Some("x/y")).await, vec!["x/y"]);
        assert_eq!(config.review_repositories(None).await, vec!["fallback/repo"]);
        config.github.repositories = vec!["a/b".to_string()];
        assert_eq!(config.review_repositories(None).await, vec!["a/b"]);
    }

    #[tokio::test]
    async fn test_detect_git_repo_from_remote() {
        let git = FakeGh::new().respond("remote get-url origin", "git@github.com:owner/repo.git\n");
        assert_eq!(detect_git_repo(&git).await.as_deref(), Some("owner/repo"));
    }

    #[tokio::test]
    async fn test_detect_git_repo_without_remote() {
        let git = FakeGh::new().fail("remote get-url origin", "error: No such remote 'origin'");
        assert_eq!(detect_git_repo(&git).await, None);
    }

    #[test]
    fn test_parse_github_remote() {
        assert_eq!(
            parse_github_remote("git@github.com:owner/repo.git\n").as_deref(),
            Some("owner/repo")
        );
        assert_eq!(
            parse_github_remote("https://github.com/owner/repo.git").as_deref(),
            Some("owner/repo")
        );
        assert_eq!(
            parse_github_remote("https://github.com/owner/repo").as_deref(),
            Some("owner/repo")
        );
        assert_eq!(parse_github_remote("https://gitlab.com/owner/repo.git"), None);
        assert_eq!(parse_github_remote("https://github.com/owner"), None);
    }
}
