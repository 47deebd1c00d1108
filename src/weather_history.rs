//! This module provides the main entry point for keeping per-city weather history in sync.
//! It ties the local CSV store to a remote archive and serializes syncs of the same city.

use crate::error::WeatherHistoryError;
use crate::history::archive::{OpenMeteoArchive, RemoteHistorySource};
use crate::history::error::HistoryStoreError;
use crate::history::store::LocalHistoryStore;
use crate::history::sync::HistorySyncEngine;
use crate::types::city_location::{CityKey, CityLocation};
use crate::types::history_frame::HistoryFrame;
use crate::types::location_directory::LocationDirectory;
use crate::types::sync_result::SyncResult;
use crate::types::weather_record::WeatherRecord;
use crate::utils::{ensure_dir_exists, get_data_dir};
use bon::bon;
use chrono::NaiveDate;
use std::collections::{hash_map::Entry, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task;

/// The main client struct for keeping daily weather history on disk.
///
/// Each city's history lives in one CSV file inside the data folder. A sync fetches only
/// the days missing from that file and appends them. Syncs of the same city are
/// serialized; different cities proceed independently.
///
/// Create an instance using [`WeatherHistory::new()`] for the default data directory, or
/// [`WeatherHistory::with_data_folder()`] for a custom location.
///
/// # Examples
///
/// ```rust,no_run
/// # use weather_history::{WeatherHistory, WeatherHistoryError, CityLocation};
/// # use chrono::NaiveDate;
/// # #[tokio::main]
/// # async fn main() -> Result<(), WeatherHistoryError> {
/// let history = WeatherHistory::new().await?;
/// let chicago = CityLocation::new("Chicago", 41.8781, -87.6298, "America/Chicago");
///
/// let result = history
///     .sync()
///     .location(&chicago)
///     .state("Illinois")
///     .city("Chicago")
///     .start(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
///     .end(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap())
///     .call()
///     .await;
/// println!("{}", result.summary());
/// # Ok(())
/// # }
/// ```
pub struct WeatherHistory {
    engine: HistorySyncEngine,
    city_locks: Mutex<HashMap<CityKey, Arc<Mutex<()>>>>,
}

#[bon]
impl WeatherHistory {
    /// Creates a client storing history in `data_folder`, backed by the Open-Meteo archive.
    ///
    /// The directory is created if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns [`WeatherHistoryError::DataDirCreation`] if the directory cannot be created,
    /// or [`WeatherHistoryError::Archive`] if the HTTP client cannot be built.
    pub async fn with_data_folder(data_folder: PathBuf) -> Result<Self, WeatherHistoryError> {
        let archive = OpenMeteoArchive::builder().build()?;
        Self::with_source(data_folder, Arc::new(archive)).await
    }

    /// Creates a client with a custom remote source, e.g. an archive mirror or a test double.
    pub async fn with_source(
        data_folder: PathBuf,
        source: Arc<dyn RemoteHistorySource>,
    ) -> Result<Self, WeatherHistoryError> {
        ensure_dir_exists(&data_folder)
            .await
            .map_err(|e| WeatherHistoryError::DataDirCreation(data_folder.clone(), e))?;
        Ok(Self {
            engine: HistorySyncEngine::new(LocalHistoryStore::new(&data_folder), source),
            city_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Creates a client using the default data directory
    /// (`<local data dir>/weather_history_rs`, e.g. `~/.local/share/weather_history_rs` on Linux).
    ///
    /// # Errors
    ///
    /// Returns [`WeatherHistoryError::DataDirResolution`] if the platform has no local data
    /// directory, plus the errors of [`WeatherHistory::with_data_folder`].
    pub async fn new() -> Result<Self, WeatherHistoryError> {
        let data_folder = get_data_dir().ok_or(WeatherHistoryError::DataDirResolution)?;
        Self::with_data_folder(data_folder).await
    }

    pub fn data_folder(&self) -> &Path {
        self.engine.store().folder()
    }

    /// Path of the history file for a city. The file may not exist yet.
    pub fn store_path(&self, state: &str, city: &str) -> PathBuf {
        self.engine.store().path_for(&CityKey::new(state, city))
    }

    /// Brings the stored history of a city up to date for `[start, min(end, today)]`.
    ///
    /// This method uses a builder pattern.
    ///
    /// # Arguments
    ///
    /// * `.location(&CityLocation)`: **Required.** Coordinates and time zone sent to the archive.
    /// * `.state(&str)` / `.city(&str)`: **Required.** Identify the history file.
    /// * `.start(NaiveDate)` / `.end(NaiveDate)`: **Required.** Inclusive range to cover.
    /// * `.today(NaiveDate)`: Optional. Upper bound for `end`. Defaults to the current date in
    ///   the location's time zone.
    ///
    /// Never fails as a whole: problems are listed in [`SyncResult::errors`] and the stored
    /// file is left readable.
    #[builder]
    pub async fn sync(
        &self,
        location: &CityLocation,
        state: &str,
        city: &str,
        start: NaiveDate,
        end: NaiveDate,
        today: Option<NaiveDate>,
    ) -> SyncResult {
        let key = CityKey::new(state, city);
        let today = today.unwrap_or_else(|| location.today());
        let lock = self.city_lock(&key).await;
        let _guard = lock.lock().await;
        self.engine.sync(&key, location, start, end, today).await
    }

    /// Resolves `state`/`city` in `directory` and syncs it, with today taken in the city's
    /// time zone.
    ///
    /// # Errors
    ///
    /// Returns [`WeatherHistoryError::UnknownCity`] if the directory has no such city.
    pub async fn sync_city(
        &self,
        directory: &LocationDirectory,
        state: &str,
        city: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<SyncResult, WeatherHistoryError> {
        let location =
            directory
                .resolve(state, city)
                .ok_or_else(|| WeatherHistoryError::UnknownCity {
                    state: state.to_string(),
                    city: city.to_string(),
                })?;
        Ok(self
            .sync()
            .location(location)
            .state(state)
            .city(city)
            .start(start)
            .end(end)
            .call()
            .await)
    }

    /// All valid stored records of a city, ascending by date. Empty if never synced.
    pub async fn read_history(
        &self,
        state: &str,
        city: &str,
    ) -> Result<Vec<WeatherRecord>, WeatherHistoryError> {
        let key = CityKey::new(state, city);
        let lock = self.city_lock(&key).await;
        let _guard = lock.lock().await;
        let store = self.engine.store().clone();
        let records = task::spawn_blocking(move || store.read_all(&key))
            .await
            .map_err(HistoryStoreError::from)??;
        Ok(records)
    }

    /// The stored history of a city as a Polars-backed [`HistoryFrame`].
    pub async fn frame(&self, state: &str, city: &str) -> Result<HistoryFrame, WeatherHistoryError> {
        let records = self.read_history(state, city).await?;
        Ok(HistoryFrame::from_records(&records)?)
    }

    async fn city_lock(&self, key: &CityKey) -> Arc<Mutex<()>> {
        let mut locks = self.city_locks.lock().await;
        match locks.entry(key.clone()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => entry.insert(Arc::new(Mutex::new(()))).clone(),
        }
    }
}
