use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::granularity::{DateRange, Granularity};
use super::portfolio::PortfolioId;
use crate::errors::CoreError;

/// A single data point of a value series.
///
/// `date` holds the bucket key (`YYYY-MM-DD`, `YYYY-MM` or `YYYY`), never a parsed date,
/// so that string order is chronological order for every granularity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuePoint {
    pub date: String,
    pub value: f64,
}

impl ValuePoint {
    pub fn new(date: impl Into<String>, value: f64) -> Self {
        Self {
            date: date.into(),
            value,
        }
    }
}

/// Start/end/change summary of a value series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub start_value: f64,
    pub end_value: f64,
    pub change: f64,
    /// Percent change relative to `start_value`; exactly 0 when `start_value` is 0.
    pub change_pct: f64,
}

impl PerformanceMetrics {
    /// Metrics from the first and last points. All zero for an empty series.
    pub fn from_series(series: &[ValuePoint]) -> Self {
        let (Some(first), Some(last)) = (series.first(), series.last()) else {
            return Self::default();
        };
        let change = last.value - first.value;
        let change_pct = if first.value == 0.0 {
            0.0
        } else {
            change / first.value * 100.0
        };
        Self {
            start_value: first.value,
            end_value: last.value,
            change,
            change_pct,
        }
    }
}

/// Value series and metrics of one portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioPerformance {
    pub id: PortfolioId,
    pub name: String,
    pub data_points: Vec<ValuePoint>,
    #[serde(flatten)]
    pub metrics: PerformanceMetrics,
}

/// Value series summed across portfolios, with an optional per-portfolio breakdown.
///
/// `portfolios` is `None` when the request targeted one specific portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatePerformance {
    pub period: Granularity,
    pub data_points: Vec<ValuePoint>,
    #[serde(flatten)]
    pub metrics: PerformanceMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolios: Option<Vec<PortfolioPerformance>>,
}

impl AggregatePerformance {
    /// An explicitly empty result (nothing to value anywhere).
    pub fn empty(period: Granularity, per_portfolio: Option<Vec<PortfolioPerformance>>) -> Self {
        Self {
            period,
            data_points: Vec::new(),
            metrics: PerformanceMetrics::default(),
            portfolios: per_portfolio,
        }
    }
}

/// Raw query parameters of a performance request, exactly as received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceQuery {
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub portfolio_id: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

/// A validated performance request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformanceRequest {
    pub granularity: Granularity,
    pub range: DateRange,
    pub portfolio_id: Option<PortfolioId>,
}

impl PerformanceQuery {
    /// Validate and fill defaults, with `today` as the default end date.
    ///
    /// Fails with `ValidationError` on an unknown period keyword, a malformed
    /// date or portfolio id, or `start > end`. Range length is not limited.
    pub fn resolve(&self, today: NaiveDate) -> Result<PerformanceRequest, CoreError> {
        let granularity = match non_empty(&self.period) {
            Some(period) => period.parse()?,
            None => Granularity::default(),
        };

        let portfolio_id = non_empty(&self.portfolio_id)
            .map(|raw| {
                raw.parse::<PortfolioId>().map_err(|_| {
                    CoreError::ValidationError(format!("Invalid portfolio id '{raw}'"))
                })
            })
            .transpose()?;

        let end = match non_empty(&self.end_date) {
            Some(raw) => parse_date("end_date", raw)?,
            None => today,
        };
        let start = match non_empty(&self.start_date) {
            Some(raw) => parse_date("start_date", raw)?,
            None => end
                .checked_sub_days(Days::new(granularity.default_lookback_days()))
                .unwrap_or(end),
        };

        let range = DateRange::new(start, end)?;

        Ok(PerformanceRequest {
            granularity,
            range,
            portfolio_id,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, CoreError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        CoreError::ValidationError(format!("Invalid {field} '{raw}': expected YYYY-MM-DD"))
    })
}
