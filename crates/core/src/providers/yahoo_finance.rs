use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::traits::PriceHistoryProvider;
use crate::errors::CoreError;
use crate::models::granularity::LookupWindow;
use crate::models::price::HistoryQuote;

/// Yahoo Finance API provider for stock/equity/ETF history.
///
/// - **Free**: No API key required.
/// - **No strict rate limits** (unofficial public API).
/// - **Coverage**: Global equities, ETFs, indices, mutual funds, major crypto pairs.
///
/// Uses the `yahoo_finance_api` crate, which handles the cookie/crumb dance.
/// Range keywords map one to one onto Yahoo's `range` parameter.
pub struct YahooFinanceProvider {
    connector: yahoo_finance_api::YahooConnector,
}

const PROVIDER: &str = "Yahoo Finance";

impl YahooFinanceProvider {
    pub fn new() -> Result<Self, CoreError> {
        let connector = yahoo_finance_api::YahooConnector::new().map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Failed to create connector: {e}"),
        })?;
        Ok(Self { connector })
    }

    /// Convert a unix timestamp (seconds) to a UTC datetime.
    fn timestamp_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(ts, 0)
    }
}

#[async_trait]
impl PriceHistoryProvider for YahooFinanceProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn get_history(
        &self,
        symbol: &str,
        window: LookupWindow,
    ) -> Result<Vec<HistoryQuote>, CoreError> {
        let resp = self
            .connector
            .get_quote_range(symbol, "1d", window.as_str())
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Failed to fetch {window} history for {symbol}: {e}"),
            })?;

        let quotes = resp.quotes().map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Failed to parse quotes for {symbol}: {e}"),
        })?;

        if quotes.is_empty() {
            return Err(CoreError::PriceNotAvailable {
                symbol: symbol.to_string(),
            });
        }

        Ok(quotes
            .iter()
            .filter_map(|q| {
                let timestamp = Self::timestamp_to_datetime(q.timestamp)?;
                Some(HistoryQuote::new(timestamp, q.close))
            })
            .collect())
    }
}
