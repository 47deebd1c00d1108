//! Identifies cities and where they are.

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Geographic reference data for one city. Supplied by the caller, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// IANA time zone name, e.g. `"America/New_York"`.
    #[serde(rename = "timezone")]
    pub time_zone: String,
}

impl CityLocation {
    pub fn new(
        name: impl Into<String>,
        latitude: f64,
        longitude: f64,
        time_zone: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
            time_zone: time_zone.into(),
        }
    }

    /// The current calendar date at this location.
    ///
    /// Falls back to the machine's local date if [`time_zone`](Self::time_zone) is not a
    /// known IANA zone.
    pub fn today(&self) -> NaiveDate {
        match self.time_zone.parse::<Tz>() {
            Ok(tz) => chrono::Utc::now().with_timezone(&tz).date_naive(),
            Err(_) => {
                log::warn!(
                    "Unknown time zone '{}' for {}, using local date",
                    self.time_zone,
                    self.name
                );
                chrono::Local::now().date_naive()
            }
        }
    }
}

/// The `(state, city)` pair a history file belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CityKey {
    pub state: String,
    pub city: String,
}

impl CityKey {
    pub fn new(state: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            city: city.into(),
        }
    }

    /// Deterministic file stem: lower-cased, spaces replaced with underscores.
    ///
    /// # Examples
    ///
    /// ```
    /// use weather_history::CityKey;
    ///
    /// let key = CityKey::new("New York", "New York City");
    /// assert_eq!(key.file_stem(), "new_york_new_york_city_daily_weather_history");
    /// ```
    pub fn file_stem(&self) -> String {
        format!(
            "{}_{}_daily_weather_history",
            normalize(&self.state),
            normalize(&self.city)
        )
    }
}

fn normalize(part: &str) -> String {
    part.replace(' ', "_").to_lowercase()
}

impl fmt::Display for CityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.city, self.state)
    }
}
