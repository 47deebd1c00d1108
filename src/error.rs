use crate::history::error::{ArchiveError, HistoryStoreError};
use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeatherHistoryError {
    #[error(transparent)]
    Store(#[from] HistoryStoreError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error("Failed to create data directory '{0}'")]
    DataDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine data directory")]
    DataDirResolution,

    #[error("No location known for {city}, {state}")]
    UnknownCity { state: String, city: String },
}
