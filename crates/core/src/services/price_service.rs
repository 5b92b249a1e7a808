use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::granularity::{Granularity, LookupWindow};
use crate::models::price::PriceSeriesCache;
use crate::models::settings::PerformanceSettings;
use crate::providers::traits::PriceHistoryProvider;

/// Builds the per-request [`PriceSeriesCache`] from remote price history.
///
/// Fetch strategy:
/// - **One call per symbol**, all using the same coarse lookup window.
/// - **Bounded fan-out**: at most `max_concurrent` fetches in flight.
/// - **Fail-soft**: a symbol whose fetch errors, times out or yields no usable
///   close is simply absent from the cache. It never fails the batch.
///
/// Nothing is kept between calls; every request re-fetches.
pub struct PriceService {
    provider: Arc<dyn PriceHistoryProvider>,
    max_concurrent: usize,
    fetch_timeout: Duration,
}

impl PriceService {
    pub fn new(provider: Arc<dyn PriceHistoryProvider>) -> Self {
        Self::with_settings(provider, &PerformanceSettings::default())
    }

    pub fn with_settings(
        provider: Arc<dyn PriceHistoryProvider>,
        settings: &PerformanceSettings,
    ) -> Self {
        Self {
            provider,
            max_concurrent: settings.fetch_concurrency(),
            fetch_timeout: settings.symbol_fetch_timeout(),
        }
    }

    /// Name of the underlying provider (for logs).
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Fetch and bucket the history of every symbol in `symbols`.
    ///
    /// The result does not depend on the order in which fetches complete:
    /// each symbol owns its own bucket map.
    pub async fn build_price_series(
        &self,
        symbols: &BTreeSet<String>,
        window: LookupWindow,
        granularity: Granularity,
    ) -> PriceSeriesCache {
        let provider = self.provider.as_ref();
        let fetch_timeout = self.fetch_timeout;

        let results: Vec<_> = stream::iter(symbols.iter().cloned())
            .map(|symbol| async move {
                let result =
                    tokio::time::timeout(fetch_timeout, provider.get_history(&symbol, window))
                        .await;
                (symbol, result)
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut cache = PriceSeriesCache::new();
        for (symbol, result) in results {
            match result {
                Ok(Ok(quotes)) => {
                    let raw = quotes.len();
                    let buckets = cache.insert_history(&symbol, quotes, granularity);
                    if buckets == 0 {
                        warn!(%symbol, raw, "no usable closes in price history, symbol skipped");
                    } else {
                        debug!(%symbol, raw, buckets, "bucketed price history");
                    }
                }
                Ok(Err(e)) => {
                    warn!(%symbol, error = %e, "price history unavailable, symbol skipped");
                }
                Err(_) => {
                    warn!(
                        %symbol,
                        timeout_secs = fetch_timeout.as_secs(),
                        "price history fetch timed out, symbol skipped"
                    );
                }
            }
        }
        cache
    }
}
