mod config;
mod editor;
mod format_refs;
mod github;
mod markdown;
mod note;
mod period;
mod review;
mod scaffold;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

use config::{Config, ConfigError};
use github::{GitHub, SubprocessRunner};
use period::Period;

/// Journal tools: keep daily markdown notes in sync with GitHub activity.
#[derive(Parser, Debug)]
#[command(name = "journal", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh the review section of a daily note with GitHub activity
    Review {
        /// Day of the note (YYYY-MM-DD), defaults to today
        date: Option<String>,

        /// today, this-week, this-month, this-quarter or YYYY-MM-DD
        #[arg(short, long)]
        period: Option<Period>,

        /// Repository to query (owner/repo or GitHub URL)
        #[arg(short, long)]
        repo: Option<String>,

        /// Heading of the section to replace
        #[arg(short, long, default_value = review::DEFAULT_SECTION)]
        name: String,

        /// Note to update instead of the daily note
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Show the diff without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Turn bare issue/PR references into links and tick finished ones
    FormatRefs {
        /// Markdown file, defaults to today's note
        file: Option<PathBuf>,

        /// Repository for unqualified references (owner/repo or GitHub URL)
        #[arg(short, long)]
        repo: Option<String>,

        /// Show the diff without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the path of a daily note
    NotePath {
        /// YYYY-MM-DD, defaults to today
        date: Option<String>,
    },

    /// Open a daily note in the notes editor
    Open {
        /// YYYY-MM-DD, defaults to today
        date: Option<String>,
    },

    /// Scaffold an executable task script
    NewScript {
        #[arg(long)]
        name: String,

        #[arg(long)]
        description: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    info!("loading configuration");
    let config = Config::load()?;
    let today = Local::now().date_naive();

    match command {
        Command::Review {
            date,
            period,
            repo,
            name,
            file,
            dry_run,
        } => {
            let day = note_day(date.as_deref(), today)?;
            let window = period.unwrap_or(Period::Date(day)).window(day);
            let path = match file {
                Some(path) => path,
                None => config.daily_note_path(&day.to_string())?,
            };
            let repos = config
                .review_repositories(repo.as_deref().map(normalize_repo).as_deref())
                .await;
            debug!(repos = ?repos, "review repositories");

            let gh = github_client(&config);
            let outcome = review::update_note(&gh, &path, &name, &repos, window, dry_run)
                .instrument(info_span!("review", day = %day))
                .await?;
            note::print_outcome(&outcome, dry_run);
        }
        Command::FormatRefs {
            file,
            repo,
            dry_run,
        } => {
            let path = match file {
                Some(path) => path,
                None => config.daily_note_path(&today.to_string())?,
            };
            let repo = repo.as_deref().map(normalize_repo);

            let gh = github_client(&config);
            let (outcome, report) =
                format_refs::update_file(&gh, &path, repo.as_deref(), || config.fallback_repo(), dry_run)
                    .instrument(info_span!("format_refs"))
                    .await?;
            note::print_outcome(&outcome, dry_run);
            for miss in &report.unresolved {
                eprintln!(
                    "{} {}#{}: {}",
                    "unresolved".yellow(),
                    miss.repo,
                    miss.number,
                    miss.reason
                );
            }
        }
        Command::NotePath { date } => {
            let day = note_day(date.as_deref(), today)?;
            println!("{}", config.daily_note_path(&day.to_string())?.display());
        }
        Command::Open { date } => {
            let day = note_day(date.as_deref(), today)?;
            let uri = editor::open_daily_note(&config.editor.vault, &day.to_string())?;
            info!(uri = %uri, "opened note");
        }
        Command::NewScript { name, description } => {
            let path = scaffold::new_script(&config.scripts.dir, &name, description.as_deref())?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn note_day(date: Option<&str>, today: NaiveDate) -> Result<NaiveDate, ConfigError> {
    match date {
        None => Ok(today),
        Some(text) => period::parse_day(text).ok_or_else(|| ConfigError::InvalidDate(text.to_string())),
    }
}

/// Accept `owner/repo` or any GitHub URL inside that repository.
fn normalize_repo(arg: &str) -> String {
    markdown::detect::repo_from_url(arg).unwrap_or_else(|| arg.trim_end_matches('/').to_string())
}

fn github_client(config: &Config) -> GitHub<SubprocessRunner> {
    let runner = SubprocessRunner::new(
        config.github.gh_path.clone(),
        Duration::from_secs(config.github.timeout_secs),
    );
    GitHub::new(runner, config.github.user.clone(), config.github.limit)
}
