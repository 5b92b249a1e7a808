use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::CoreError;

/// Bucketing resolution of a performance chart.
///
/// Every granularity produces bucket keys whose lexicographic order equals
/// chronological order (year-major, zero-padded components).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// `YYYY-MM-DD`
    #[default]
    Daily,
    /// `YYYY-MM-DD` of the Sunday closing the (Monday-start) week
    Weekly,
    /// `YYYY-MM`
    Monthly,
    /// `YYYY`
    Yearly,
}

impl Granularity {
    pub const ALL: [Granularity; 4] = [
        Granularity::Daily,
        Granularity::Weekly,
        Granularity::Monthly,
        Granularity::Yearly,
    ];

    /// Lowercase keyword used in query strings and responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
            Granularity::Yearly => "yearly",
        }
    }

    /// How far back a chart reaches when the caller gives no start date.
    pub fn default_lookback_days(&self) -> u64 {
        match self {
            Granularity::Daily => 30,
            Granularity::Weekly => 90,
            Granularity::Monthly => 365,
            Granularity::Yearly => 1825,
        }
    }

    /// Canonical bucket label for a calendar date.
    pub fn bucket_key(&self, date: NaiveDate) -> String {
        match self {
            Granularity::Daily => date.format("%Y-%m-%d").to_string(),
            Granularity::Weekly => week_ending_sunday(date).format("%Y-%m-%d").to_string(),
            Granularity::Monthly => format!("{:04}-{:02}", date.year(), date.month()),
            Granularity::Yearly => format!("{:04}", date.year()),
        }
    }

    /// Canonical bucket label for a timestamp, taken on its UTC calendar date.
    pub fn bucket_key_at(&self, timestamp: DateTime<Utc>) -> String {
        self.bucket_key(timestamp.date_naive())
    }

    /// Advance `date` by one bucket. `None` past the end of the calendar.
    pub fn step(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Granularity::Daily => date.checked_add_days(Days::new(1)),
            Granularity::Weekly => date.checked_add_days(Days::new(7)),
            Granularity::Monthly => date.checked_add_months(Months::new(1)),
            Granularity::Yearly => date.checked_add_months(Months::new(12)),
        }
    }
}

/// The Sunday on or after `date`.
fn week_ending_sunday(date: NaiveDate) -> NaiveDate {
    let to_sunday = 6 - u64::from(date.weekday().num_days_from_monday());
    date.checked_add_days(Days::new(to_sunday)).unwrap_or(date)
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Granularity::Daily),
            "weekly" => Ok(Granularity::Weekly),
            "monthly" => Ok(Granularity::Monthly),
            "yearly" => Ok(Granularity::Yearly),
            _ => Err(CoreError::ValidationError(format!(
                "Invalid period '{s}': expected one of daily, weekly, monthly, yearly"
            ))),
        }
    }
}

/// Inclusive calendar date range of a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CoreError> {
        if start > end {
            return Err(CoreError::ValidationError(format!(
                "start date ({start}) must not be after end date ({end})"
            )));
        }
        Ok(Self { start, end })
    }

    /// Number of days between start and end (0 for a single-day range).
    pub fn span_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Bucket keys of the first and last day, used as inclusive string bounds.
    pub fn key_bounds(&self, granularity: Granularity) -> (String, String) {
        (
            granularity.bucket_key(self.start),
            granularity.bucket_key(self.end),
        )
    }
}

/// Coarse remote lookup window understood by price history providers.
///
/// Provider windows are anchored at "now", so the chosen window must reach
/// back to the range start, not just span the range length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LookupWindow {
    OneMonth,
    SixMonths,
    OneYear,
    TwoYears,
    FiveYears,
    TenYears,
}

impl LookupWindow {
    /// Smallest window spanning `days` calendar days.
    pub fn for_span_days(days: i64) -> Self {
        match days {
            d if d <= 30 => LookupWindow::OneMonth,
            d if d <= 180 => LookupWindow::SixMonths,
            d if d <= 365 => LookupWindow::OneYear,
            d if d <= 730 => LookupWindow::TwoYears,
            d if d <= 1825 => LookupWindow::FiveYears,
            _ => LookupWindow::TenYears,
        }
    }

    /// Window that covers `range` when fetched on `today`.
    pub fn covering(range: &DateRange, today: NaiveDate) -> Self {
        let back_to_start = (today - range.start).num_days();
        Self::for_span_days(back_to_start.max(range.span_days()))
    }

    /// Calendar days reached back by this window, rounded up.
    pub fn days(&self) -> u64 {
        match self {
            LookupWindow::OneMonth => 31,
            LookupWindow::SixMonths => 184,
            LookupWindow::OneYear => 366,
            LookupWindow::TwoYears => 731,
            LookupWindow::FiveYears => 1827,
            LookupWindow::TenYears => 3653,
        }
    }

    /// Range keyword passed to providers (`1mo`, `6mo`, `1y`, `2y`, `5y`, `10y`).
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupWindow::OneMonth => "1mo",
            LookupWindow::SixMonths => "6mo",
            LookupWindow::OneYear => "1y",
            LookupWindow::TwoYears => "2y",
            LookupWindow::FiveYears => "5y",
            LookupWindow::TenYears => "10y",
        }
    }
}

impl std::fmt::Display for LookupWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn week_ends_on_sunday_for_every_weekday() {
        // 2024-03-04 is a Monday
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        for offset in 0..7 {
            let date = monday.checked_add_days(Days::new(offset)).unwrap();
            assert_eq!(week_ending_sunday(date), sunday);
        }
    }

    #[test]
    fn lookup_days_cover_threshold_spans() {
        for (span, window) in [
            (30, LookupWindow::OneMonth),
            (180, LookupWindow::SixMonths),
            (365, LookupWindow::OneYear),
            (730, LookupWindow::TwoYears),
            (1825, LookupWindow::FiveYears),
            (3650, LookupWindow::TenYears),
        ] {
            assert_eq!(LookupWindow::for_span_days(span), window);
            assert!(window.days() >= span as u64);
        }
    }
}
