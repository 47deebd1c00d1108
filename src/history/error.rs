use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryStoreError {
    #[error("Failed to create history directory '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("I/O error on history file '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("CSV error on history file '{0}'")]
    Csv(PathBuf, #[source] csv::Error),

    #[error("History file '{path}' has unexpected columns {found:?}")]
    SchemaMismatch { path: PathBuf, found: Vec<String> },

    #[error("Failed to persist repaired history file '{0}'")]
    Persist(PathBuf, #[source] tempfile::PersistError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to decode archive response from {0}")]
    Decode(String, #[source] reqwest::Error),

    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),
}
