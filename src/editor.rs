use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("Invalid editor URI: {0}")]
    Uri(String),

    #[error("Failed to open {uri}: {source}")]
    Launch {
        uri: String,
        #[source]
        source: std::io::Error,
    },
}

/// `obsidian://open` URI for the daily note of `date` in `vault`.
pub fn daily_note_uri(vault: &str, date: &str) -> Result<Url, EditorError> {
    let mut uri = Url::parse("obsidian://open").map_err(|e| EditorError::Uri(e.to_string()))?;
    uri.query_pairs_mut()
        .append_pair("vault", vault)
        .append_pair("file", &format!("daily/{date}"));
    // form encoding turns spaces into '+', which the editor takes literally
    let query = uri.query().map(|q| q.replace('+', "%20"));
    uri.set_query(query.as_deref());
    Ok(uri)
}

/// Hand the daily note URI to the platform opener.
#[instrument]
pub fn open_daily_note(vault: &str, date: &str) -> Result<Url, EditorError> {
    let uri = daily_note_uri(vault, date)?;
    debug!(uri = %uri, "opening note");
    open::that(uri.as_str()).map_err(|source| EditorError::Launch {
        uri: uri.to_string(),
        source,
    })?;
    Ok(uri)
}
