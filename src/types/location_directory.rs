//! Immutable `(state, city) -> CityLocation` lookup table, built once at startup.

use crate::types::city_location::{CityKey, CityLocation};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;

#[derive(Debug, Clone, Default)]
pub struct LocationDirectory {
    entries: HashMap<CityKey, CityLocation>,
}

// Shape of one city in the nested JSON form.
#[derive(Deserialize)]
struct CityEntry {
    lat: f64,
    lon: f64,
    timezone: String,
}

impl LocationDirectory {
    /// Builds a directory from `(state, location)` pairs. The city name is taken from
    /// `location.name`; later duplicates replace earlier ones.
    pub fn new<S: Into<String>>(entries: impl IntoIterator<Item = (S, CityLocation)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(state, location)| (CityKey::new(state, location.name.clone()), location))
            .collect();
        Self { entries }
    }

    /// Reads the nested `state -> city -> {lat, lon, timezone}` JSON form.
    ///
    /// ```
    /// use weather_history::LocationDirectory;
    ///
    /// let json = r#"{"Texas": {"Austin": {"lat": 30.2672, "lon": -97.7431, "timezone": "America/Chicago"}}}"#;
    /// let directory = LocationDirectory::from_json_reader(json.as_bytes()).unwrap();
    /// assert_eq!(directory.resolve("Texas", "Austin").unwrap().latitude, 30.2672);
    /// ```
    pub fn from_json_reader(reader: impl Read) -> Result<Self, serde_json::Error> {
        let nested: BTreeMap<String, BTreeMap<String, CityEntry>> =
            serde_json::from_reader(reader)?;
        let entries = nested.into_iter().flat_map(|(state, cities)| {
            cities.into_iter().map(move |(city, entry)| {
                (
                    state.clone(),
                    CityLocation::new(city, entry.lat, entry.lon, entry.timezone),
                )
            })
        });
        Ok(Self::new(entries))
    }

    pub fn resolve(&self, state: &str, city: &str) -> Option<&CityLocation> {
        self.entries.get(&CityKey::new(state, city))
    }

    /// All state names, sorted.
    pub fn states(&self) -> Vec<&str> {
        let mut states: Vec<&str> = self.entries.keys().map(|k| k.state.as_str()).collect();
        states.sort_unstable();
        states.dedup();
        states
    }

    /// City names within `state`, sorted. Empty for an unknown state.
    pub fn cities(&self, state: &str) -> Vec<&str> {
        let mut cities: Vec<&str> = self
            .entries
            .keys()
            .filter(|k| k.state == state)
            .map(|k| k.city.as_str())
            .collect();
        cities.sort_unstable();
        cities
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
