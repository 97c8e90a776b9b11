pub mod diff;

pub use diff::Hunk;

use colored::Colorize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Debug, Error)]
pub enum NoteError {
    #[error("Note not found: {0}")]
    Missing(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What happened to a file after applying new content.
#[derive(Debug)]
pub struct Outcome {
    pub path: PathBuf,
    pub changed: bool,
    /// Line-level changes
    pub hunks: Vec<Hunk>,
    /// False for dry runs and unchanged content
    pub written: bool,
}

/// Read a note, mapping a missing file to `NoteError::Missing`.
pub fn read(path: &Path) -> Result<String, NoteError> {
    std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            NoteError::Missing(path.to_path_buf())
        } else {
            NoteError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Replace `path`'s content `old` with `new`.
///
/// Nothing is written when the content is unchanged or `dry_run` is set,
/// so neither case touches the file's mtime.
#[instrument(skip(path, old, new), fields(path = %path.display()))]
pub fn apply(path: &Path, old: &str, new: &str, dry_run: bool) -> Result<Outcome, NoteError> {
    let mut outcome = Outcome {
        path: path.to_path_buf(),
        changed: old != new,
        hunks: diff::diff_lines(old, new),
        written: false,
    };
    if !outcome.changed {
        debug!("content unchanged");
        return Ok(outcome);
    }
    if dry_run {
        info!(hunks = outcome.hunks.len(), "dry run, not writing");
        return Ok(outcome);
    }
    write_atomic(path, new)?;
    outcome.written = true;
    info!(hunks = outcome.hunks.len(), "note updated");
    Ok(outcome)
}

/// Write `content` to `path` through a temp file in the same directory,
/// fsynced and renamed over the target. The temp file is removed if any
/// step fails.
pub fn write_atomic(path: &Path, content: &str) -> Result<(), NoteError> {
    let write_err = |source| NoteError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(content.as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    if let Ok(meta) = std::fs::metadata(path) {
        tmp.as_file().set_permissions(meta.permissions()).map_err(write_err)?;
    }
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    debug!(bytes = content.len(), "atomic write complete");
    Ok(())
}

/// Print the changes of `outcome` to stdout as a colored diff.
pub fn print_outcome(outcome: &Outcome, dry_run: bool) {
    let path = outcome.path.display();
    if !outcome.changed {
        println!("{} {}", "unchanged".dimmed(), path);
        return;
    }
    let verb = if dry_run { "would update" } else { "updated" };
    println!("{} {}", verb.bold(), path);
    for hunk in &outcome.hunks {
        println!("{}", hunk.header().cyan());
        for line in &hunk.lines {
            if line.starts_with('-') {
                println!("{}", line.red());
            } else {
                println!("{}", line.green());
            }
        }
    }
}
