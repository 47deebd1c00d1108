//! Durable per-city history files.
//!
//! Each `(state, city)` pair owns one CSV file inside the store folder. The file always
//! starts with the [`HISTORY_COLUMNS`] header, followed by one row per unique date in
//! ascending order. Every operation re-reads the file; nothing is cached in memory, so the
//! file on disk is the single source of truth.

use crate::history::error::HistoryStoreError;
use crate::types::city_location::CityKey;
use crate::types::weather_record::{WeatherRecord, HISTORY_COLUMNS};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Counts reported by [`LocalHistoryStore::append_unique`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Rows written to the file.
    pub added: usize,
    /// Records whose date was already stored, or repeated earlier in the input.
    pub skipped: usize,
    /// Corrupt tail rows cut before appending, see [`LocalHistoryStore::repair`].
    pub discarded: usize,
}

/// Counts reported by [`LocalHistoryStore::repair`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairOutcome {
    /// Data rows left in the file.
    pub kept: usize,
    /// Rows cut, from the first corrupt row to the end of the file.
    pub discarded: usize,
}

/// A folder of per-city history CSV files, one per [`CityKey`].
///
/// Cheap to clone; clones address the same folder. Methods are blocking and re-read the
/// file on every call.
#[derive(Debug, Clone)]
pub struct LocalHistoryStore {
    folder: PathBuf,
}

#[derive(Default)]
struct Scan {
    rows: Vec<StringRecord>,
    records: Vec<WeatherRecord>,
    discarded: usize,
}

enum Contents {
    Absent,
    Rows(csv::Reader<File>),
}

impl LocalHistoryStore {
    pub fn new(folder: &Path) -> Self {
        Self {
            folder: folder.to_path_buf(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn path_for(&self, key: &CityKey) -> PathBuf {
        self.folder.join(format!("{}.csv", key.file_stem()))
    }

    /// Reads every well-formed record, ascending by date.
    ///
    /// A missing or zero-length file yields an empty vector. Malformed rows are skipped
    /// with a warning; if a date appears twice the first row wins.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryStoreError::SchemaMismatch`] if the header is not exactly
    /// [`HISTORY_COLUMNS`], and `Io`/`Csv` variants if the file cannot be read.
    pub fn read_all(&self, key: &CityKey) -> Result<Vec<WeatherRecord>, HistoryStoreError> {
        let path = self.path_for(key);
        let mut reader = match Self::open(&path)? {
            Contents::Absent => {
                debug!("No history file for {} at {:?}", key, path);
                return Ok(Vec::new());
            }
            Contents::Rows(reader) => reader,
        };

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        for row in reader.records() {
            let row = match row {
                Ok(row) => row,
                Err(e) if e.is_io_error() => return Err(HistoryStoreError::Csv(path, e)),
                Err(e) => {
                    warn!("Skipping unreadable row in {:?}: {}", path, e);
                    continue;
                }
            };
            match WeatherRecord::from_csv_row(&row) {
                Ok(record) => {
                    if seen.insert(record.date) {
                        records.push(record);
                    } else {
                        warn!("Ignoring duplicate row for {} in {:?}", record.date, path);
                    }
                }
                Err(malformed) => warn!("Skipping row in {:?}: {}", path, malformed),
            }
        }
        records.sort_by_key(|r| r.date);
        Ok(records)
    }

    /// The most recent stored date, if any.
    pub fn latest_date(&self, key: &CityKey) -> Result<Option<NaiveDate>, HistoryStoreError> {
        Ok(self.read_all(key)?.last().map(|r| r.date))
    }

    /// Appends the records whose date is not stored yet, in their given order.
    ///
    /// Creates the folder and file (with header) on first use. Dates repeated within
    /// `records` are only written once. A corrupt tail is repaired before appending so new
    /// rows never land behind a row that a later repair would cut.
    ///
    /// Re-running with the same input adds nothing. An empty `records` never creates the
    /// file.
    pub fn append_unique(
        &self,
        key: &CityKey,
        records: &[WeatherRecord],
    ) -> Result<AppendOutcome, HistoryStoreError> {
        if records.is_empty() {
            let repaired = self.repair(key)?;
            return Ok(AppendOutcome {
                discarded: repaired.discarded,
                ..Default::default()
            });
        }
        fs::create_dir_all(&self.folder)
            .map_err(|e| HistoryStoreError::DirCreation(self.folder.clone(), e))?;
        let path = self.path_for(key);
        let repaired = self.repair(key)?;

        let (mut existing, needs_header) = match Self::open(&path)? {
            Contents::Absent => (HashSet::new(), true),
            Contents::Rows(mut reader) => {
                let mut dates = HashSet::new();
                for row in reader.records() {
                    let row = row.map_err(|e| HistoryStoreError::Csv(path.clone(), e))?;
                    if let Ok(record) = WeatherRecord::from_csv_row(&row) {
                        dates.insert(record.date);
                    }
                }
                (dates, false)
            }
        };

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| HistoryStoreError::Io(path.clone(), e))?;
        let terminated =
            Self::ends_with_newline(&mut file).map_err(|e| HistoryStoreError::Io(path.clone(), e))?;
        if !needs_header && !terminated {
            file.write_all(b"\n")
                .map_err(|e| HistoryStoreError::Io(path.clone(), e))?;
        }

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if needs_header {
            info!("Creating history file for {} at {:?}", key, path);
            writer
                .write_record(HISTORY_COLUMNS)
                .map_err(|e| HistoryStoreError::Csv(path.clone(), e))?;
        }

        let mut outcome = AppendOutcome {
            discarded: repaired.discarded,
            ..Default::default()
        };
        for record in records {
            if existing.insert(record.date) {
                writer
                    .write_record(&record.to_csv_row())
                    .map_err(|e| HistoryStoreError::Csv(path.clone(), e))?;
                outcome.added += 1;
            } else {
                outcome.skipped += 1;
            }
        }
        writer
            .flush()
            .map_err(|e| HistoryStoreError::Io(path.clone(), e))?;

        info!(
            "Appended {} new rows to {:?} ({} already present)",
            outcome.added, path, outcome.skipped
        );
        Ok(outcome)
    }

    /// Reads the records before the first corrupt row, in file order.
    ///
    /// This is the part of the file that survives a [`repair`](Self::repair), so it is
    /// what a sync must treat as already stored.
    pub fn read_clean_prefix(
        &self,
        key: &CityKey,
    ) -> Result<Vec<WeatherRecord>, HistoryStoreError> {
        Ok(self
            .scan(key)?
            .map(|scan| scan.records)
            .unwrap_or_default())
    }

    /// Truncates the file just before the first row with an empty or unparseable field.
    ///
    /// The header and the clean prefix are kept; the bad row and everything after it are
    /// dropped. The file is only rewritten when something is cut, and the rewrite goes
    /// through a temporary file in the same folder so a crash never leaves a half-written
    /// history behind.
    pub fn repair(&self, key: &CityKey) -> Result<RepairOutcome, HistoryStoreError> {
        let Some(scan) = self.scan(key)? else {
            return Ok(RepairOutcome::default());
        };
        if scan.discarded > 0 {
            let path = self.path_for(key);
            warn!(
                "Repairing {:?}: keeping {} rows, discarding {}",
                path,
                scan.rows.len(),
                scan.discarded
            );
            self.rewrite(&path, &scan.rows)?;
        }
        Ok(RepairOutcome {
            kept: scan.rows.len(),
            discarded: scan.discarded,
        })
    }

    /// Moves an unusable file aside to `<name>.csv.corrupt`, replacing an older backup.
    ///
    /// Returns the backup path, or `None` if there was no file.
    pub fn quarantine(&self, key: &CityKey) -> Result<Option<PathBuf>, HistoryStoreError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let backup = path.with_extension("csv.corrupt");
        if backup.exists() {
            fs::remove_file(&backup).map_err(|e| HistoryStoreError::Io(backup.clone(), e))?;
        }
        fs::rename(&path, &backup).map_err(|e| HistoryStoreError::Io(path.clone(), e))?;
        warn!("Moved unusable history file {:?} to {:?}", path, backup);
        Ok(Some(backup))
    }

    /// Splits the file into its clean prefix and the number of rows from the first corrupt
    /// row onwards. `None` if there is no file.
    fn scan(&self, key: &CityKey) -> Result<Option<Scan>, HistoryStoreError> {
        let path = self.path_for(key);
        let mut reader = match Self::open(&path)? {
            Contents::Absent => return Ok(None),
            Contents::Rows(reader) => reader,
        };

        let mut scan = Scan::default();
        let mut row = StringRecord::new();
        loop {
            let parsed = match reader.read_record(&mut row) {
                Ok(false) => break,
                Ok(true) => WeatherRecord::from_csv_row(&row).map_err(|e| e.to_string()),
                Err(e) if e.is_io_error() => return Err(HistoryStoreError::Csv(path, e)),
                Err(e) => Err(e.to_string()),
            };
            if scan.discarded > 0 {
                scan.discarded += 1;
                continue;
            }
            match parsed {
                Ok(record) => {
                    scan.rows.push(row.clone());
                    scan.records.push(record);
                }
                Err(reason) => {
                    warn!("Corrupt row in {:?}: {}", path, reason);
                    scan.discarded = 1;
                }
            }
        }
        Ok(Some(scan))
    }

    fn open(path: &Path) -> Result<Contents, HistoryStoreError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Contents::Absent),
            Err(e) => return Err(HistoryStoreError::Io(path.to_path_buf(), e)),
        };
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(file);
        // Compared as bytes: a header that is not UTF-8 is just another unknown schema.
        let headers = reader
            .byte_headers()
            .map_err(|e| HistoryStoreError::Csv(path.to_path_buf(), e))?;
        if headers.is_empty() {
            return Ok(Contents::Absent);
        }
        if !headers.iter().eq(HISTORY_COLUMNS.iter().map(|c| c.as_bytes())) {
            return Err(HistoryStoreError::SchemaMismatch {
                path: path.to_path_buf(),
                found: headers
                    .iter()
                    .map(|field| String::from_utf8_lossy(field).into_owned())
                    .collect(),
            });
        }
        Ok(Contents::Rows(reader))
    }

    fn rewrite(&self, path: &Path, rows: &[StringRecord]) -> Result<(), HistoryStoreError> {
        let temp = NamedTempFile::new_in(&self.folder)
            .map_err(|e| HistoryStoreError::Io(self.folder.clone(), e))?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(temp);
        writer
            .write_record(HISTORY_COLUMNS)
            .map_err(|e| HistoryStoreError::Csv(path.to_path_buf(), e))?;
        for row in rows {
            writer
                .write_record(row)
                .map_err(|e| HistoryStoreError::Csv(path.to_path_buf(), e))?;
        }
        let temp = writer
            .into_inner()
            .map_err(|e| HistoryStoreError::Io(path.to_path_buf(), e.into_error()))?;
        temp.persist(path)
            .map_err(|e| HistoryStoreError::Persist(path.to_path_buf(), e))?;
        Ok(())
    }

    fn ends_with_newline(file: &mut File) -> io::Result<bool> {
        let len = file.metadata()?.len();
        if len == 0 {
            return Ok(true);
        }
        file.seek(SeekFrom::Start(len - 1))?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last)?;
        Ok(last[0] == b'\n')
    }
}
