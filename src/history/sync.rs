//! Incremental synchronization of a city's history file with the remote archive.
//!
//! A sync works out which days are missing between the last stored date and the requested
//! end (never later than today), fetches exactly that gap, appends the new days without
//! duplicating dates, and repairs the file. All failures are folded into the returned
//! [`SyncResult`]; a sync never fails as a whole.

use crate::history::archive::RemoteHistorySource;
use crate::history::error::HistoryStoreError;
use crate::history::store::LocalHistoryStore;
use crate::types::city_location::{CityKey, CityLocation};
use crate::types::sync_result::{SyncError, SyncErrorKind, SyncResult, SyncState};
use crate::types::weather_record::WeatherRecord;
use chrono::{Days, NaiveDate};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::task;

/// Syncs city history files in a [`LocalHistoryStore`] from a [`RemoteHistorySource`].
///
/// The engine keeps no state between calls. Callers must not sync the same city
/// concurrently; [`crate::WeatherHistory`] serializes that with a per-city lock.
pub struct HistorySyncEngine {
    store: LocalHistoryStore,
    source: Arc<dyn RemoteHistorySource>,
}

/// Tracks the state machine of one sync call and the result being built.
struct SyncRun<'a> {
    key: &'a CityKey,
    state: SyncState,
    result: SyncResult,
}

impl<'a> SyncRun<'a> {
    fn new(key: &'a CityKey) -> Self {
        Self {
            key,
            state: SyncState::Idle,
            result: SyncResult::default(),
        }
    }

    fn enter(&mut self, next: SyncState) {
        debug_assert!(next > self.state, "{:?} -> {:?}", self.state, next);
        debug!("Sync {}: {:?} -> {:?}", self.key, self.state, next);
        self.state = next;
    }

    fn fail(&mut self, kind: SyncErrorKind, error: &dyn std::error::Error) {
        let error = SyncError::from_error(kind, error);
        warn!("Sync {}: {}", self.key, error);
        self.result.errors.push(error);
    }

    fn finish(mut self, final_record_count: usize) -> SyncResult {
        self.enter(SyncState::Done);
        self.result.final_record_count = final_record_count;
        info!("Sync {} finished: {}", self.key, self.result.summary());
        self.result
    }
}

fn storage_kind(error: &HistoryStoreError) -> SyncErrorKind {
    match error {
        HistoryStoreError::SchemaMismatch { .. } => SyncErrorKind::SchemaMismatch,
        _ => SyncErrorKind::Storage,
    }
}

impl HistorySyncEngine {
    pub fn new(store: LocalHistoryStore, source: Arc<dyn RemoteHistorySource>) -> Self {
        Self { store, source }
    }

    pub fn store(&self) -> &LocalHistoryStore {
        &self.store
    }

    /// Brings the history of `key` up to date for `[start, min(end, today)]`.
    ///
    /// Only the days after the last stored date are fetched. With an empty store the whole
    /// clamped range is fetched. A reversed range (`start > end`) is a no-op.
    pub async fn sync(
        &self,
        key: &CityKey,
        location: &CityLocation,
        start: NaiveDate,
        end: NaiveDate,
        today: NaiveDate,
    ) -> SyncResult {
        let mut run = SyncRun::new(key);
        if start > end {
            debug!("Sync {}: empty request {} > {}", key, start, end);
            return run.finish(0);
        }
        let end = end.min(today);

        run.enter(SyncState::DeterminingGap);
        let existing = match self
            .blocking(key, |store, key| store.read_clean_prefix(key))
            .await
        {
            Ok(records) => records,
            Err(e @ HistoryStoreError::SchemaMismatch { .. }) => {
                run.fail(SyncErrorKind::SchemaMismatch, &e);
                if let Err(e) = self.blocking(key, |store, key| store.quarantine(key)).await {
                    run.fail(storage_kind(&e), &e);
                    return run.finish(0);
                }
                Vec::new()
            }
            Err(e) => {
                run.fail(storage_kind(&e), &e);
                return run.finish(0);
            }
        };

        let gap_start = match existing.iter().map(|r| r.date).max() {
            None => start,
            Some(last) => match last.checked_add_days(Days::new(1)) {
                Some(next) => next,
                None => return run.finish(existing.len()),
            },
        };
        if gap_start > end {
            run.enter(SyncState::NoGapFetchNeeded);
            info!(
                "{} is up to date through {} ({} records)",
                key,
                end,
                existing.len()
            );
            let final_count = self.repair_and_count(&mut run, key, existing.len()).await;
            return run.finish(final_count);
        }

        run.enter(SyncState::FetchingRemote);
        run.result.fetched_range = Some((gap_start, end));
        info!("Fetching missing days {} to {} for {}", gap_start, end, key);
        let response = match self.source.fetch(location, gap_start, end).await {
            Ok(response) => response,
            Err(e) => {
                run.fail(SyncErrorKind::RemoteFetch, &e);
                return run.finish(existing.len());
            }
        };

        run.enter(SyncState::Merging);
        let mut fetched: Vec<WeatherRecord> = Vec::with_capacity(response.daily.len());
        for candidate in response.daily.records() {
            match candidate {
                Ok(record) if record.date > end => {
                    debug!("Sync {}: dropping {} beyond {}", key, record.date, end);
                }
                Ok(record) => fetched.push(record),
                Err(malformed) => {
                    run.result.malformed_count += 1;
                    run.fail(SyncErrorKind::MalformedRecord, &malformed);
                }
            }
        }
        match self
            .blocking(key, move |store, key| store.append_unique(key, &fetched))
            .await
        {
            Ok(outcome) => {
                run.result.added_count = outcome.added;
                run.result.skipped_existing_count = outcome.skipped;
                run.result.repaired_discarded_count += outcome.discarded;
            }
            Err(e) => run.fail(storage_kind(&e), &e),
        }

        run.enter(SyncState::Repairing);
        let expected = existing.len() + run.result.added_count;
        let final_count = self.repair_and_count(&mut run, key, expected).await;
        run.finish(final_count)
    }

    /// Repairs the file and re-reads it for the final record count. `expected` is reported
    /// if the re-read fails.
    async fn repair_and_count(
        &self,
        run: &mut SyncRun<'_>,
        key: &CityKey,
        expected: usize,
    ) -> usize {
        match self.blocking(key, |store, key| store.repair(key)).await {
            Ok(outcome) => run.result.repaired_discarded_count += outcome.discarded,
            Err(e) => run.fail(storage_kind(&e), &e),
        }
        match self.blocking(key, |store, key| store.read_all(key)).await {
            Ok(records) => records.len(),
            Err(e) => {
                run.fail(storage_kind(&e), &e);
                expected
            }
        }
    }

    /// Runs a store operation on the blocking thread pool.
    async fn blocking<T, F>(&self, key: &CityKey, op: F) -> Result<T, HistoryStoreError>
    where
        T: Send + 'static,
        F: FnOnce(&LocalHistoryStore, &CityKey) -> Result<T, HistoryStoreError> + Send + 'static,
    {
        let store = self.store.clone();
        let key = key.clone();
        task::spawn_blocking(move || op(&store, &key)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::archive::{ArchiveResponse, DailySeries};
    use crate::history::error::ArchiveError;
    use crate::types::weather_record::HISTORY_COLUMNS;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    /// Archive fake that serves a fixed temperature for every requested day, optionally
    /// leaving the last day unfinished, and records each requested range.
    #[derive(Default)]
    struct FakeArchive {
        calls: AtomicUsize,
        ranges: Mutex<Vec<(NaiveDate, NaiveDate)>>,
        fail: bool,
        partial_last_day: bool,
        lag_days: u64,
    }

    impl FakeArchive {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemoteHistorySource for FakeArchive {
        async fn fetch(
            &self,
            _location: &CityLocation,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<ArchiveResponse, ArchiveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.ranges.lock().unwrap().push((start, end));
            if self.fail {
                let err = reqwest::Client::new()
                    .get("http://[::1")
                    .build()
                    .unwrap_err();
                return Err(ArchiveError::NetworkRequest("http://[::1".into(), err));
            }
            let last = end - Days::new(self.lag_days);
            let mut daily = DailySeries::default();
            for date in start.iter_days().take_while(|d| *d <= last) {
                let partial = self.partial_last_day && date == last;
                daily.time.push(date.to_string());
                daily.weather_code.push(Some(1));
                daily.temp_max.push(if partial { None } else { Some(80.0) });
                daily.temp_min.push(if partial { None } else { Some(60.0) });
                daily.precipitation_sum.push(Some(0.0));
                daily.wind_speed_max.push(Some(7.5));
                daily.sunrise.push(Some(format!("{}T05:30", date)));
                daily.sunset.push(Some(format!("{}T20:30", date)));
            }
            Ok(ArchiveResponse { daily })
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn key() -> CityKey {
        CityKey::new("Illinois", "Chicago")
    }

    fn chicago() -> CityLocation {
        CityLocation::new("Chicago", 41.8781, -87.6298, "America/Chicago")
    }

    fn setup(archive: FakeArchive) -> (TempDir, Arc<FakeArchive>, HistorySyncEngine) {
        let dir = tempdir().unwrap();
        let archive = Arc::new(archive);
        let engine = HistorySyncEngine::new(LocalHistoryStore::new(dir.path()), archive.clone());
        (dir, archive, engine)
    }

    fn stored_dates(engine: &HistorySyncEngine) -> Vec<NaiveDate> {
        engine
            .store()
            .read_all(&key())
            .unwrap()
            .into_iter()
            .map(|r| r.date)
            .collect()
    }

    #[tokio::test]
    async fn test_empty_store_fetches_full_range() {
        let (_dir, archive, engine) = setup(FakeArchive::default());
        let result = engine
            .sync(&key(), &chicago(), date("2024-07-01"), date("2024-07-03"), date("2024-08-01"))
            .await;

        assert_eq!(result.added_count, 3);
        assert_eq!(result.final_record_count, 3);
        assert!(result.errors.is_empty());
        assert_eq!(archive.calls(), 1);
        assert_eq!(
            stored_dates(&engine),
            vec![date("2024-07-01"), date("2024-07-02"), date("2024-07-03")]
        );
    }

    #[tokio::test]
    async fn test_up_to_date_store_skips_fetch() {
        let (_dir, archive, engine) = setup(FakeArchive::default());
        let today = date("2024-07-05");
        engine
            .sync(&key(), &chicago(), date("2024-07-01"), today, today)
            .await;
        assert_eq!(archive.calls(), 1);

        let result = engine
            .sync(&key(), &chicago(), date("2024-07-01"), today, today)
            .await;
        assert_eq!(result.added_count, 0);
        assert_eq!(result.final_record_count, 5);
        assert_eq!(result.fetched_range, None);
        assert_eq!(archive.calls(), 1);
    }

    #[tokio::test]
    async fn test_sync_is_idempotent() {
        let (_dir, _archive, engine) = setup(FakeArchive::default());
        let (start, end, today) = (date("2024-06-01"), date("2024-06-30"), date("2024-07-10"));
        let first = engine.sync(&key(), &chicago(), start, end, today).await;
        let second = engine.sync(&key(), &chicago(), start, end, today).await;

        assert_eq!(first.final_record_count, 30);
        assert_eq!(second.final_record_count, first.final_record_count);
        assert_eq!(second.added_count, 0);
    }

    #[tokio::test]
    async fn test_only_the_gap_is_requested() {
        let (_dir, archive, engine) = setup(FakeArchive::default());
        let start = date("2024-07-01");
        engine
            .sync(&key(), &chicago(), start, date("2024-07-04"), date("2024-07-20"))
            .await;
        let result = engine
            .sync(&key(), &chicago(), start, date("2024-07-10"), date("2024-07-20"))
            .await;

        assert_eq!(result.fetched_range, Some((date("2024-07-05"), date("2024-07-10"))));
        assert_eq!(result.added_count, 6);
        assert_eq!(result.final_record_count, 10);
        assert_eq!(
            archive.ranges.lock().unwrap().last().copied(),
            Some((date("2024-07-05"), date("2024-07-10")))
        );
    }

    #[tokio::test]
    async fn test_end_is_clamped_to_today() {
        let (_dir, archive, engine) = setup(FakeArchive::default());
        let today = date("2024-07-05");
        let result = engine
            .sync(&key(), &chicago(), date("2024-07-01"), date("2024-12-31"), today)
            .await;

        assert_eq!(archive.ranges.lock().unwrap()[0], (date("2024-07-01"), today));
        assert_eq!(stored_dates(&engine).last().copied(), Some(today));
        assert_eq!(result.final_record_count, 5);
    }

    #[tokio::test]
    async fn test_lagging_archive_ends_at_yesterday() {
        let (_dir, _archive, engine) = setup(FakeArchive {
            lag_days: 1,
            ..Default::default()
        });
        let today = date("2024-07-05");
        engine
            .sync(&key(), &chicago(), date("2024-07-01"), today, today)
            .await;
        let latest = stored_dates(&engine).last().copied().unwrap();
        assert!(latest == today || latest == date("2024-07-04"));
        assert!(stored_dates(&engine).iter().all(|d| *d <= today));
    }

    #[tokio::test]
    async fn test_reversed_range_is_a_no_op() {
        let (_dir, archive, engine) = setup(FakeArchive::default());
        let result = engine
            .sync(&key(), &chicago(), date("2024-07-05"), date("2024-07-01"), date("2024-08-01"))
            .await;
        assert_eq!(result, SyncResult::default());
        assert_eq!(archive.calls(), 0);
        assert!(!engine.store().path_for(&key()).exists());
    }

    #[tokio::test]
    async fn test_remote_failure_leaves_store_unchanged() {
        let (_dir, _archive, engine) = setup(FakeArchive::default());
        let today = date("2024-07-03");
        engine
            .sync(&key(), &chicago(), date("2024-07-01"), today, today)
            .await;
        let path = engine.store().path_for(&key());
        let before = std::fs::read(&path).unwrap();

        let failing = HistorySyncEngine::new(
            LocalHistoryStore::new(engine.store().folder()),
            Arc::new(FakeArchive {
                fail: true,
                ..Default::default()
            }),
        );
        let result = failing
            .sync(&key(), &chicago(), date("2024-07-01"), date("2024-07-06"), date("2024-07-06"))
            .await;

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, SyncErrorKind::RemoteFetch);
        assert_eq!(result.added_count, 0);
        assert_eq!(result.final_record_count, 3);
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_partial_day_is_dropped_and_counted() {
        let (_dir, _archive, engine) = setup(FakeArchive {
            partial_last_day: true,
            ..Default::default()
        });
        let today = date("2024-07-04");
        let result = engine
            .sync(&key(), &chicago(), date("2024-07-01"), today, today)
            .await;

        assert_eq!(result.added_count, 3);
        assert_eq!(result.malformed_count, 1);
        assert_eq!(
            result.errors_of(SyncErrorKind::MalformedRecord).count(),
            1
        );
        assert_eq!(stored_dates(&engine).last().copied(), Some(date("2024-07-03")));
    }

    #[tokio::test]
    async fn test_schema_mismatch_rebuilds_store() {
        let (_dir, archive, engine) = setup(FakeArchive::default());
        let path = engine.store().path_for(&key());
        std::fs::write(&path, "when,hot,cold\n2024-07-01,90,70\n").unwrap();

        let result = engine
            .sync(&key(), &chicago(), date("2024-07-01"), date("2024-07-02"), date("2024-07-10"))
            .await;

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, SyncErrorKind::SchemaMismatch);
        assert_eq!(archive.ranges.lock().unwrap()[0].0, date("2024-07-01"));
        assert_eq!(result.final_record_count, 2);
        let header = std::fs::read_to_string(&path).unwrap();
        assert!(header.starts_with(HISTORY_COLUMNS[0]));
        assert!(path.with_extension("csv.corrupt").exists());
    }

    #[tokio::test]
    async fn test_preexisting_corrupt_tail_is_repaired() {
        let (_dir, archive, engine) = setup(FakeArchive::default());
        let path = engine.store().path_for(&key());
        let mut text = HISTORY_COLUMNS.join(",");
        text.push('\n');
        text.push_str("2024-07-01,80,60,0,5,Fog,2024-07-01T05:30,2024-07-01T20:30\n");
        text.push_str("2024-07-02,,,,,Fog,,\n");
        std::fs::write(&path, text).unwrap();

        let result = engine
            .sync(&key(), &chicago(), date("2024-07-01"), date("2024-07-03"), date("2024-07-10"))
            .await;

        assert_eq!(
            archive.ranges.lock().unwrap()[0],
            (date("2024-07-02"), date("2024-07-03"))
        );
        assert_eq!(result.repaired_discarded_count, 1);
        assert_eq!(result.added_count, 2);
        assert_eq!(
            stored_dates(&engine),
            vec![date("2024-07-01"), date("2024-07-02"), date("2024-07-03")]
        );
    }

    #[tokio::test]
    async fn test_up_to_date_store_is_still_repaired() {
        let (_dir, archive, engine) = setup(FakeArchive::default());
        let path = engine.store().path_for(&key());
        let mut text = HISTORY_COLUMNS.join(",");
        text.push('\n');
        for d in 1..=5 {
            text.push_str(&format!(
                "2024-07-0{d},80,60,0,5,Fog,2024-07-0{d}T05:30,2024-07-0{d}T20:30\n"
            ));
        }
        text.push_str("2024-07-06,,60,0,5,Fog,2024-07-06T05:30,2024-07-06T20:30\n");
        text.push_str("2024-07-07,80,60,0,5,Fog,2024-07-07T05:30,2024-07-07T20:30\n");
        std::fs::write(&path, text).unwrap();

        let result = engine
            .sync(&key(), &chicago(), date("2024-07-01"), date("2024-07-05"), date("2024-07-10"))
            .await;

        assert_eq!(archive.calls(), 0);
        assert_eq!(result.fetched_range, None);
        assert_eq!(result.repaired_discarded_count, 2);
        assert_eq!(result.final_record_count, 5);
        assert_eq!(engine.store().read_all(&key()).unwrap().len(), 5);
        assert!(!std::fs::read_to_string(&path).unwrap().contains("2024-07-07"));
    }

    #[tokio::test]
    async fn test_undecodable_header_rebuilds_store() {
        let (_dir, archive, engine) = setup(FakeArchive::default());
        let path = engine.store().path_for(&key());
        std::fs::write(&path, b"Date,Max Temperature (\xb0F)\n").unwrap();

        let result = engine
            .sync(&key(), &chicago(), date("2024-07-01"), date("2024-07-03"), date("2024-07-10"))
            .await;

        let kinds: Vec<SyncErrorKind> = result.errors.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![SyncErrorKind::SchemaMismatch]);
        assert_eq!(result.fetched_range, Some((date("2024-07-01"), date("2024-07-03"))));
        assert_eq!(result.final_record_count, 3);
        assert_eq!(archive.calls(), 1);
        assert!(path.with_extension("csv.corrupt").exists());

        let again = engine
            .sync(&key(), &chicago(), date("2024-07-01"), date("2024-07-03"), date("2024-07-10"))
            .await;
        assert!(again.errors.is_empty());
        assert_eq!(archive.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_fetch_creates_no_file() {
        let (_dir, archive, engine) = setup(FakeArchive {
            lag_days: 1,
            ..Default::default()
        });
        let day = date("2024-07-01");
        let result = engine
            .sync(&key(), &chicago(), day, day, date("2024-07-10"))
            .await;

        assert_eq!(archive.calls(), 1);
        assert_eq!(result.added_count, 0);
        assert_eq!(result.final_record_count, 0);
        assert!(result.errors.is_empty());
        assert!(!engine.store().path_for(&key()).exists());
    }
}
