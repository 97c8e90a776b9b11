use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ScaffoldError {
    #[error("Invalid script name '{0}': use lowercase letters, digits, '-' and '_'")]
    InvalidName(String),

    #[error("{0} already exists")]
    Exists(PathBuf),

    #[error("Failed to write script: {0}")]
    Io(#[from] std::io::Error),
}

fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

/// Body of a new task script.
pub fn template(name: &str, description: Option<&str>) -> String {
    let description = description
        .unwrap_or(name)
        .split(['\n', '\r'])
        .filter(|part| !part.trim().is_empty())
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\\', "\\\\")
        .replace('"', "\\\"");
    format!(
        "#!/usr/bin/env bash\n\
         #MISE description=\"{description}\"\n\
         set -euo pipefail\n\
         \n\
         echo \"{name}: not implemented yet\" >&2\n\
         exit 1\n"
    )
}

/// Create an executable task script `<dir>/<name>`. Never overwrites.
pub fn new_script(dir: &Path, name: &str, description: Option<&str>) -> Result<PathBuf, ScaffoldError> {
    if !valid_name(name) {
        return Err(ScaffoldError::InvalidName(name.to_string()));
    }
    let path = dir.join(name);
    if path.exists() {
        return Err(ScaffoldError::Exists(path));
    }
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(template(name, description).as_bytes())?;
    tmp.as_file().sync_all()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o755))?;
    }
    tmp.persist_noclobber(&path).map_err(|e| {
        if e.error.kind() == std::io::ErrorKind::AlreadyExists {
            ScaffoldError::Exists(path.clone())
        } else {
            ScaffoldError::Io(e.error)
        }
    })?;
    info!(path = %path.display(), "scaffolded script");
    Ok(path)
}
