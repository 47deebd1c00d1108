//! Contains the `HistoryFrame` structure for lazy, columnar queries over a city's history.

use crate::types::weather_record::WeatherRecord;
use chrono::NaiveDate;
use polars::prelude::*;

/// A wrapper around a Polars `LazyFrame` holding daily history records.
///
/// Columns: `date` (Date), `temp_max`, `temp_min`, `precipitation`, `wind_speed_max`
/// (all f64, °F / inch / mph), `weather_code` (i64), `sunrise` and `sunset` (str).
///
/// Instances are typically obtained via [`crate::WeatherHistory::frame`].
///
/// # Errors
///
/// Operations that trigger computation on the underlying `LazyFrame` (e.g. `.collect()`)
/// can return a [`PolarsError`].
#[derive(Clone)]
pub struct HistoryFrame {
    /// The underlying Polars LazyFrame containing the daily data.
    pub frame: LazyFrame,
}

impl HistoryFrame {
    /// Builds a frame from records, keeping their order.
    ///
    /// # Example
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use polars::prelude::{col, lit};
    /// use weather_history::{HistoryFrame, WeatherRecord};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let record = WeatherRecord {
    ///     date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
    ///     max_temp_f: 91.0,
    ///     min_temp_f: 72.0,
    ///     precipitation_in: 0.0,
    ///     max_wind_mph: 8.0,
    ///     weather_code: 1,
    ///     sunrise_utc: "2024-07-01T06:31".into(),
    ///     sunset_utc: "2024-07-01T20:37".into(),
    /// };
    /// let frame = HistoryFrame::from_records(&[record])?;
    /// let hot = frame.filter(col("temp_max").gt(lit(90.0f64))).frame.collect()?;
    /// assert_eq!(hot.height(), 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_records(records: &[WeatherRecord]) -> Result<Self, PolarsError> {
        let df = df!(
            "date" => records.iter().map(|r| r.date).collect::<Vec<NaiveDate>>(),
            "temp_max" => records.iter().map(|r| r.max_temp_f).collect::<Vec<f64>>(),
            "temp_min" => records.iter().map(|r| r.min_temp_f).collect::<Vec<f64>>(),
            "precipitation" => records.iter().map(|r| r.precipitation_in).collect::<Vec<f64>>(),
            "wind_speed_max" => records.iter().map(|r| r.max_wind_mph).collect::<Vec<f64>>(),
            "weather_code" => records.iter().map(|r| r.weather_code).collect::<Vec<i64>>(),
            "sunrise" => records.iter().map(|r| r.sunrise_utc.as_str()).collect::<Vec<&str>>(),
            "sunset" => records.iter().map(|r| r.sunset_utc.as_str()).collect::<Vec<&str>>()
        )?;
        Ok(Self::new(df.lazy()))
    }

    pub fn new(frame: LazyFrame) -> Self {
        Self { frame }
    }

    /// Filters the rows with an arbitrary Polars predicate, lazily.
    pub fn filter(&self, predicate: Expr) -> HistoryFrame {
        HistoryFrame::new(self.frame.clone().filter(predicate))
    }

    /// Rows with `start <= date <= end`.
    pub fn get_range(&self, start: NaiveDate, end: NaiveDate) -> HistoryFrame {
        self.filter(
            col("date")
                .gt_eq(lit(start))
                .and(col("date").lt_eq(lit(end))),
        )
    }

    /// The row for `date`, if stored. Collecting yields zero or one row.
    pub fn get_at(&self, date: NaiveDate) -> HistoryFrame {
        self.filter(col("date").eq(lit(date)))
    }
}
