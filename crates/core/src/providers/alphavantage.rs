use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::traits::PriceHistoryProvider;
use crate::errors::CoreError;
use crate::models::granularity::LookupWindow;
use crate::models::price::HistoryQuote;

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER: &str = "Alpha Vantage";

/// Alpha Vantage API provider for stock/equity daily history.
///
/// - **Free tier**: 25 requests/day (across ALL endpoints).
/// - **Requires**: API key (set in settings as "alphavantage").
/// - **Coverage**: 100k+ global equity symbols.
///
/// `compact` output covers the last 100 trading days, enough for a one month
/// window; anything longer asks for `full` and trims to the window.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AlphaVantageProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, BASE_URL)
    }

    /// Point the provider at another endpoint (mirrors, local fakes).
    pub fn with_base_url(api_key: String, base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key,
            base_url: base_url.into(),
        }
    }

    fn output_size(window: LookupWindow) -> &'static str {
        match window {
            LookupWindow::OneMonth => "compact",
            _ => "full",
        }
    }

    /// Parse a `TIME_SERIES_DAILY` JSON body into quotes inside the trailing
    /// window ending at `today`. Unparseable dates and closes are skipped.
    pub fn parse_response(
        body: &str,
        symbol: &str,
        window: LookupWindow,
        today: NaiveDate,
    ) -> Result<Vec<HistoryQuote>, CoreError> {
        let resp: TimeSeriesResponse = serde_json::from_str(body).map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Failed to parse time series for {symbol}: {e}"),
        })?;

        let Some(series) = resp.time_series else {
            let reason = resp
                .error_message
                .or(resp.note)
                .unwrap_or_else(|| "API limit may be exceeded".into());
            return Err(CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("No time series data for {symbol}: {reason}"),
            });
        };

        let cutoff = today.checked_sub_days(Days::new(window.days()));
        let mut quotes: Vec<HistoryQuote> = series
            .iter()
            .filter_map(|(date_str, data)| {
                let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()?;
                if cutoff.is_some_and(|c| date < c) || date > today {
                    return None;
                }
                let close: f64 = data.close.parse().ok()?;
                let timestamp = date.and_hms_opt(0, 0, 0)?.and_utc();
                Some(HistoryQuote::new(timestamp, close))
            })
            .collect();
        quotes.sort_by_key(|q| q.timestamp);
        Ok(quotes)
    }
}

// ── Alpha Vantage API response types ────────────────────────────────

#[derive(Deserialize)]
struct TimeSeriesResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<HashMap<String, DailyData>>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct DailyData {
    #[serde(rename = "4. close")]
    close: String,
}

#[async_trait]
impl PriceHistoryProvider for AlphaVantageProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn get_history(
        &self,
        symbol: &str,
        window: LookupWindow,
    ) -> Result<Vec<HistoryQuote>, CoreError> {
        let symbol_upper = symbol.to_uppercase();
        let body = self
            .client
            .get(&self.base_url)
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol_upper.as_str()),
                ("outputsize", Self::output_size(window)),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Self::parse_response(&body, symbol, window, Utc::now().date_naive())
    }
}
