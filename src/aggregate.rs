//! Derived temperature views over a stored record set: monthly means and a date-windowed
//! daily series.

use crate::types::weather_record::WeatherRecord;
use chrono::{Datelike, Days, NaiveDate};
use std::collections::BTreeMap;

/// Number of calendar days the dashboard's daily chart covers.
pub const DEFAULT_WINDOW_DAYS: u64 = 365;
/// Number of points the dashboard's daily chart shows at once.
pub const DEFAULT_VISIBLE_POINTS: usize = 14;

/// Mean of the daily average temperature `(max + min) / 2` per calendar month.
///
/// Keys are `"YYYY-MM"` and iterate in ascending order. Months without records are absent.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use weather_history::{monthly_averages, WeatherRecord};
///
/// let day = |d: u32, max: f64, min: f64| WeatherRecord {
///     date: NaiveDate::from_ymd_opt(2024, 7, d).unwrap(),
///     max_temp_f: max,
///     min_temp_f: min,
///     precipitation_in: 0.0,
///     max_wind_mph: 0.0,
///     weather_code: 0,
///     sunrise_utc: String::new(),
///     sunset_utc: String::new(),
/// };
/// let averages = monthly_averages(&[day(1, 80.0, 60.0), day(15, 90.0, 70.0)]);
/// assert_eq!(averages.get("2024-07"), Some(&75.0));
/// ```
pub fn monthly_averages(records: &[WeatherRecord]) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<(i32, u32), (f64, usize)> = BTreeMap::new();
    for record in records {
        let entry = sums
            .entry((record.date.year(), record.date.month()))
            .or_insert((0.0, 0));
        entry.0 += record.daily_avg_temp_f();
        entry.1 += 1;
    }
    sums.into_iter()
        .filter(|(_, (_, count))| *count > 0)
        .map(|((year, month), (sum, count))| {
            (format!("{:04}-{:02}", year, month), sum / count as f64)
        })
        .collect()
}

/// Daily temperature series aligned by index: `dates[i]` is the day of `avg[i]`,
/// `min[i]` and `max[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyWindow {
    pub dates: Vec<NaiveDate>,
    pub avg: Vec<f64>,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

impl DailyWindow {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Lowest minimum minus `padding` and highest maximum plus `padding`, for a stable
    /// chart axis while scrolling. `None` for an empty window.
    pub fn y_limits(&self, padding: f64) -> Option<(f64, f64)> {
        let low = self.min.iter().copied().reduce(f64::min)?;
        let high = self.max.iter().copied().reduce(f64::max)?;
        Some((low - padding, high + padding))
    }

    /// The `len` points starting at index `start`, clamped to what exists.
    pub fn visible(&self, start: usize, len: usize) -> DailyWindow {
        let start = start.min(self.len());
        let end = start.saturating_add(len).min(self.len());
        DailyWindow {
            dates: self.dates[start..end].to_vec(),
            avg: self.avg[start..end].to_vec(),
            min: self.min[start..end].to_vec(),
            max: self.max[start..end].to_vec(),
        }
    }
}

/// The records of the `window_size` calendar days ending `offset` days before the latest
/// record, ascending by date.
///
/// With `offset == 0` the window ends at the latest stored date. Days without a record are
/// simply absent from the series.
pub fn daily_window(records: &[WeatherRecord], window_size: u64, offset: u64) -> DailyWindow {
    let Some(latest) = records.iter().map(|r| r.date).max() else {
        return DailyWindow::default();
    };
    if window_size == 0 {
        return DailyWindow::default();
    }
    let Some(last) = latest.checked_sub_days(Days::new(offset)) else {
        return DailyWindow::default();
    };
    let first = last
        .checked_sub_days(Days::new(window_size - 1))
        .unwrap_or(NaiveDate::MIN);

    let mut selected: Vec<&WeatherRecord> = records
        .iter()
        .filter(|r| r.date >= first && r.date <= last)
        .collect();
    selected.sort_by_key(|r| r.date);

    let mut window = DailyWindow::default();
    for record in selected {
        window.dates.push(record.date);
        window.avg.push(record.daily_avg_temp_f());
        window.min.push(record.min_temp_f);
        window.max.push(record.max_temp_f);
    }
    window
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: &str, max: f64, min: f64) -> WeatherRecord {
        WeatherRecord {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            max_temp_f: max,
            min_temp_f: min,
            precipitation_in: 0.0,
            max_wind_mph: 3.0,
            weather_code: 2,
            sunrise_utc: "06:00".into(),
            sunset_utc: "20:00".into(),
        }
    }

    #[test]
    fn test_monthly_average_of_two_days() {
        let averages = monthly_averages(&[
            record("2024-07-01", 80.0, 60.0),
            record("2024-07-15", 90.0, 70.0),
        ]);
        assert_eq!(averages.len(), 1);
        assert_eq!(averages["2024-07"], 75.0);
    }

    #[test]
    fn test_months_are_sorted_across_years() {
        let averages = monthly_averages(&[
            record("2025-01-03", 40.0, 20.0),
            record("2024-12-31", 50.0, 30.0),
            record("2024-02-29", 60.0, 40.0),
        ]);
        let keys: Vec<&str> = averages.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["2024-02", "2024-12", "2025-01"]);
        assert_eq!(averages["2025-01"], 30.0);
        assert!(monthly_averages(&[]).is_empty());
    }

    #[test]
    fn test_window_ends_at_latest_date() {
        let records: Vec<WeatherRecord> = (1..=20)
            .map(|d| record(&format!("2024-07-{:02}", d), 80.0 + d as f64, 60.0))
            .collect();
        let window = daily_window(&records, 7, 0);
        assert_eq!(window.len(), 7);
        assert_eq!(window.dates[0].to_string(), "2024-07-14");
        assert_eq!(window.dates[6].to_string(), "2024-07-20");
        assert_eq!(window.max[6], 100.0);
        assert_eq!(window.avg[6], 80.0);
        assert_eq!(window.min[0], 60.0);
    }

    #[test]
    fn test_window_offset_and_gaps() {
        let records = vec![
            record("2024-07-10", 80.0, 60.0),
            record("2024-07-01", 70.0, 50.0),
            record("2024-07-08", 75.0, 55.0),
            record("2024-07-04", 72.0, 52.0),
        ];
        let window = daily_window(&records, 5, 2);
        let days: Vec<String> = window.dates.iter().map(|d| d.to_string()).collect();
        assert_eq!(days, vec!["2024-07-04", "2024-07-08"]);
        assert_eq!(daily_window(&records, 0, 0), DailyWindow::default());
        assert!(daily_window(&[], 365, 0).is_empty());
    }

    #[test]
    fn test_visible_slice_and_limits() {
        let records: Vec<WeatherRecord> = (1..=20)
            .map(|d| record(&format!("2024-07-{:02}", d), 80.0 + d as f64, 60.0 - d as f64))
            .collect();
        let window = daily_window(&records, DEFAULT_WINDOW_DAYS, 0);
        assert_eq!(window.len(), 20);

        let view = window.visible(10, DEFAULT_VISIBLE_POINTS);
        assert_eq!(view.len(), 10);
        assert_eq!(view.dates[0].to_string(), "2024-07-11");
        assert!(window.visible(50, 14).is_empty());

        assert_eq!(window.y_limits(5.0), Some((35.0, 105.0)));
        assert_eq!(DailyWindow::default().y_limits(5.0), None);
    }
}
