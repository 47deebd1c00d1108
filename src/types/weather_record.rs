//! The canonical daily weather record and the rules that decide whether a candidate
//! record (a CSV row or an archive entry) is well-formed.

use crate::types::weather_code::{describe_weather_code, parse_weather_description};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

/// Column headers of a history file, in order. A file whose header row differs in any way
/// is considered to have an unknown schema.
pub const HISTORY_COLUMNS: [&str; 8] = [
    "Date",
    "Max Temperature (°F)",
    "Min Temperature (°F)",
    "Precipitation (inch)",
    "Max Wind Speed (mph)",
    "Weather Description",
    "Sunrise (UTC)",
    "Sunset (UTC)",
];

/// One calendar day of aggregated weather for one location.
///
/// Within a city's history the `date` is unique; two records are duplicates iff their
/// dates are equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub date: NaiveDate,
    pub max_temp_f: f64,
    pub min_temp_f: f64,
    pub precipitation_in: f64,
    pub max_wind_mph: f64,
    pub weather_code: i64,
    pub sunrise_utc: String,
    pub sunset_utc: String,
}

/// A row or archive entry that was dropped because a required field was missing or not
/// a finite number.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("malformed record for '{date}': {reason}")]
pub struct MalformedRecord {
    /// The raw date text of the offending entry (may itself be the bad field).
    pub date: String,
    pub reason: String,
}

impl MalformedRecord {
    pub(crate) fn new(date: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            reason: reason.into(),
        }
    }
}

impl WeatherRecord {
    /// Average of the day's maximum and minimum temperature.
    pub fn daily_avg_temp_f(&self) -> f64 {
        (self.max_temp_f + self.min_temp_f) / 2.0
    }

    /// Human-readable description of [`weather_code`](Self::weather_code).
    pub fn weather_description(&self) -> String {
        describe_weather_code(self.weather_code)
    }

    /// Parses one data row of a history file.
    ///
    /// Every cell must be present and non-blank, the date must be ISO 8601 and every
    /// numeric cell a finite number. The description cell must map back to a weather code.
    pub fn from_csv_row(row: &csv::StringRecord) -> Result<Self, MalformedRecord> {
        let date_text = row.get(0).unwrap_or_default().trim();
        if row.len() != HISTORY_COLUMNS.len() {
            return Err(MalformedRecord::new(
                date_text,
                format!(
                    "expected {} fields, found {}",
                    HISTORY_COLUMNS.len(),
                    row.len()
                ),
            ));
        }
        let cell = |idx: usize| required_cell(row, idx, date_text);
        let number = |idx: usize| numeric_cell(row, idx, date_text);

        let date = parse_date(cell(0)?)?;
        let description = cell(5)?;
        let weather_code = parse_weather_description(description).ok_or_else(|| {
            MalformedRecord::new(
                date_text,
                format!("unrecognized weather description: {}", description),
            )
        })?;

        Ok(WeatherRecord {
            date,
            max_temp_f: number(1)?,
            min_temp_f: number(2)?,
            precipitation_in: number(3)?,
            max_wind_mph: number(4)?,
            weather_code,
            sunrise_utc: cell(6)?.to_string(),
            sunset_utc: cell(7)?.to_string(),
        })
    }

    /// Serializes the record in [`HISTORY_COLUMNS`] order.
    pub fn to_csv_row(&self) -> [String; 8] {
        [
            self.date.format(DATE_FORMAT).to_string(),
            self.max_temp_f.to_string(),
            self.min_temp_f.to_string(),
            self.precipitation_in.to_string(),
            self.max_wind_mph.to_string(),
            self.weather_description(),
            self.sunrise_utc.clone(),
            self.sunset_utc.clone(),
        ]
    }
}

fn required_cell<'a>(
    row: &'a csv::StringRecord,
    idx: usize,
    date_text: &str,
) -> Result<&'a str, MalformedRecord> {
    let value = row.get(idx).unwrap_or_default().trim();
    if value.is_empty() {
        Err(MalformedRecord::new(
            date_text,
            format!("'{}' is empty", HISTORY_COLUMNS[idx]),
        ))
    } else {
        Ok(value)
    }
}

fn numeric_cell(row: &csv::StringRecord, idx: usize, date_text: &str) -> Result<f64, MalformedRecord> {
    let text = required_cell(row, idx, date_text)?;
    parse_finite(text).ok_or_else(|| {
        MalformedRecord::new(
            date_text,
            format!("'{}' is not a finite number: {}", HISTORY_COLUMNS[idx], text),
        )
    })
}

pub(crate) fn parse_date(text: &str) -> Result<NaiveDate, MalformedRecord> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
        .map_err(|e| MalformedRecord::new(text, format!("invalid date: {}", e)))
}

fn parse_finite(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}
