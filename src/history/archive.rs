//! The remote side of a history sync: a source of daily aggregates for a location and
//! date range, and its Open-Meteo archive implementation.

use crate::history::error::ArchiveError;
use crate::types::city_location::CityLocation;
use crate::types::weather_record::{parse_date, MalformedRecord, WeatherRecord, DATE_FORMAT};
use async_trait::async_trait;
use bon::bon;
use chrono::NaiveDate;
use log::{info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const OPEN_METEO_ARCHIVE_URL: &str = "https://archive-api.open-meteo.com/v1/archive";

const DAILY_FIELDS: &str = "weather_code,temperature_2m_max,temperature_2m_min,precipitation_sum,wind_speed_10m_max,sunrise,sunset";

/// Fetches daily aggregated weather for a location over an inclusive date range.
///
/// Implementations perform a single attempt: no retries and no internal timeout unless
/// the caller configured one. Any failure is reported as an [`ArchiveError`].
#[async_trait]
pub trait RemoteHistorySource: Send + Sync {
    async fn fetch(
        &self,
        location: &CityLocation,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ArchiveResponse, ArchiveError>;
}

/// Body of an archive response. Only the `daily` block is used.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ArchiveResponse {
    #[serde(default)]
    pub daily: DailySeries,
}

/// Parallel per-day arrays: `time[i]` is the date of every other `*[i]`.
///
/// The archive reports `null` for values it does not have yet (typically the current,
/// unfinished day).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DailySeries {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub weather_code: Vec<Option<i64>>,
    #[serde(default, rename = "temperature_2m_max")]
    pub temp_max: Vec<Option<f64>>,
    #[serde(default, rename = "temperature_2m_min")]
    pub temp_min: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation_sum: Vec<Option<f64>>,
    #[serde(default, rename = "wind_speed_10m_max")]
    pub wind_speed_max: Vec<Option<f64>>,
    #[serde(default)]
    pub sunrise: Vec<Option<String>>,
    #[serde(default)]
    pub sunset: Vec<Option<String>>,
}

impl DailySeries {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Converts every day into a record, or the reason it had to be dropped.
    ///
    /// A shorter array than `time` means the missing positions have no value.
    pub fn records(&self) -> Vec<Result<WeatherRecord, MalformedRecord>> {
        (0..self.time.len()).map(|i| self.record_at(i)).collect()
    }

    fn record_at(&self, i: usize) -> Result<WeatherRecord, MalformedRecord> {
        let date_text = self.time[i].as_str();
        let date = parse_date(date_text)?;

        let number = |values: &[Option<f64>], field: &str| -> Result<f64, MalformedRecord> {
            match values.get(i).copied().flatten() {
                Some(v) if v.is_finite() => Ok(v),
                Some(v) => Err(MalformedRecord::new(
                    date_text,
                    format!("{} is not finite: {}", field, v),
                )),
                None => Err(MalformedRecord::new(date_text, format!("{} is missing", field))),
            }
        };
        let text = |values: &[Option<String>], field: &str| -> Result<String, MalformedRecord> {
            match values.get(i).and_then(|v| v.as_deref()).map(str::trim) {
                Some(v) if !v.is_empty() => Ok(v.to_string()),
                _ => Err(MalformedRecord::new(date_text, format!("{} is missing", field))),
            }
        };

        Ok(WeatherRecord {
            date,
            max_temp_f: number(&self.temp_max, "temperature_2m_max")?,
            min_temp_f: number(&self.temp_min, "temperature_2m_min")?,
            precipitation_in: number(&self.precipitation_sum, "precipitation_sum")?,
            max_wind_mph: number(&self.wind_speed_max, "wind_speed_10m_max")?,
            weather_code: self
                .weather_code
                .get(i)
                .copied()
                .flatten()
                .ok_or_else(|| MalformedRecord::new(date_text, "weather_code is missing"))?,
            sunrise_utc: text(&self.sunrise, "sunrise")?,
            sunset_utc: text(&self.sunset, "sunset")?,
        })
    }
}

/// [`RemoteHistorySource`] backed by the Open-Meteo historical weather API.
///
/// Values are requested in Fahrenheit, miles per hour and inches, with day boundaries in
/// the location's time zone.
#[derive(Debug, Clone)]
pub struct OpenMeteoArchive {
    client: Client,
    base_url: String,
}

#[bon]
impl OpenMeteoArchive {
    /// Creates an archive client.
    ///
    /// # Arguments
    ///
    /// * `.base_url(String)`: Optional. Defaults to [`OPEN_METEO_ARCHIVE_URL`].
    /// * `.timeout(Duration)`: Optional. Per-request timeout; none by default.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use weather_history::OpenMeteoArchive;
    ///
    /// let archive = OpenMeteoArchive::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .build()
    ///     .unwrap();
    /// ```
    #[builder]
    pub fn new(
        #[builder(into)] base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ArchiveError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build().map_err(ArchiveError::ClientBuild)?,
            base_url: base_url.unwrap_or_else(|| OPEN_METEO_ARCHIVE_URL.to_string()),
        })
    }
}

#[async_trait]
impl RemoteHistorySource for OpenMeteoArchive {
    async fn fetch(
        &self,
        location: &CityLocation,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ArchiveResponse, ArchiveError> {
        let url = self.base_url.clone();
        info!(
            "Requesting archive data for {} from {} to {}",
            location.name, start, end
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                ("timezone", location.time_zone.clone()),
                ("start_date", start.format(DATE_FORMAT).to_string()),
                ("end_date", end.format(DATE_FORMAT).to_string()),
                ("daily", DAILY_FIELDS.to_string()),
                ("temperature_unit", "fahrenheit".to_string()),
                ("wind_speed_unit", "mph".to_string()),
                ("precipitation_unit", "inch".to_string()),
            ])
            .send()
            .await
            .map_err(|e| ArchiveError::NetworkRequest(url.clone(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(if let Some(status) = e.status() {
                    ArchiveError::HttpStatus {
                        url,
                        status,
                        source: e,
                    }
                } else {
                    ArchiveError::NetworkRequest(url, e)
                });
            }
        };

        let body = response
            .json::<ArchiveResponse>()
            .await
            .map_err(|e| ArchiveError::Decode(url.clone(), e))?;
        info!(
            "Received {} archive days for {}",
            body.daily.len(),
            location.name
        );
        Ok(body)
    }
}
