mod aggregate;
mod error;
mod history;
mod types;
mod utils;
mod weather_history;

pub use error::WeatherHistoryError;
pub use weather_history::*;

pub use aggregate::*;

pub use history::archive::{
    ArchiveResponse, DailySeries, OpenMeteoArchive, RemoteHistorySource, OPEN_METEO_ARCHIVE_URL,
};
pub use history::error::{ArchiveError, HistoryStoreError};
pub use history::store::{AppendOutcome, LocalHistoryStore, RepairOutcome};
pub use history::sync::HistorySyncEngine;

pub use types::city_location::{CityKey, CityLocation};
pub use types::history_frame::HistoryFrame;
pub use types::location_directory::LocationDirectory;
pub use types::sync_result::{SyncError, SyncErrorKind, SyncResult, SyncState};
pub use types::weather_code::{describe_weather_code, WeatherCode};
pub use types::weather_record::{MalformedRecord, WeatherRecord, HISTORY_COLUMNS};
