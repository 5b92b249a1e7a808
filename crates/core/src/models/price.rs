use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::granularity::Granularity;

/// One raw observation as returned by a price history provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryQuote {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

impl HistoryQuote {
    pub fn new(timestamp: DateTime<Utc>, close: f64) -> Self {
        Self { timestamp, close }
    }

    /// Usable closes are finite and strictly positive.
    pub fn is_usable(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}

/// A bucketed close price for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub symbol: String,
    pub bucket_key: String,
    pub close: f64,
}

/// Per-symbol bucketed close prices for one request: `symbol -> {bucket_key -> close}`.
///
/// Built fresh for every request and dropped with it. Bucket maps are ordered,
/// so the first entry of a symbol is its earliest observation.
#[derive(Debug, Clone, Default)]
pub struct PriceSeriesCache {
    series: HashMap<String, BTreeMap<String, f64>>,
}

impl PriceSeriesCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bucket a symbol's raw history into the cache.
    ///
    /// Unusable closes are dropped. Quotes are stably sorted by timestamp first,
    /// so when several land in one bucket the chronologically last one wins.
    /// A symbol with no usable quote is not recorded at all.
    pub fn insert_history(
        &mut self,
        symbol: &str,
        mut quotes: Vec<HistoryQuote>,
        granularity: Granularity,
    ) -> usize {
        quotes.retain(HistoryQuote::is_usable);
        quotes.sort_by_key(|q| q.timestamp);

        let mut buckets = BTreeMap::new();
        for quote in quotes {
            buckets.insert(granularity.bucket_key_at(quote.timestamp), quote.close);
        }

        let count = buckets.len();
        if count > 0 {
            self.series.insert(symbol.to_string(), buckets);
        }
        count
    }

    /// Insert a single already-bucketed price.
    pub fn set_price(&mut self, symbol: &str, bucket_key: &str, close: f64) {
        self.series
            .entry(symbol.to_string())
            .or_default()
            .insert(bucket_key.to_string(), close);
    }

    /// Exact-bucket price lookup.
    pub fn price_at(&self, symbol: &str, bucket_key: &str) -> Option<f64> {
        self.series.get(symbol)?.get(bucket_key).copied()
    }

    /// Price at the symbol's earliest bucket.
    pub fn earliest_price(&self, symbol: &str) -> Option<f64> {
        self.series
            .get(symbol)?
            .first_key_value()
            .map(|(_, price)| *price)
    }

    /// Union of bucket keys across every symbol, sorted.
    pub fn bucket_keys(&self) -> BTreeSet<String> {
        self.series
            .values()
            .flat_map(|buckets| buckets.keys().cloned())
            .collect()
    }

    /// Flatten into individual points, ordered by symbol then bucket.
    pub fn points(&self) -> Vec<PricePoint> {
        let mut symbols: Vec<&String> = self.series.keys().collect();
        symbols.sort();
        symbols
            .into_iter()
            .flat_map(|symbol| {
                self.series[symbol].iter().map(move |(key, close)| PricePoint {
                    symbol: symbol.clone(),
                    bucket_key: key.clone(),
                    close: *close,
                })
            })
            .collect()
    }

    pub fn contains_symbol(&self, symbol: &str) -> bool {
        self.series.contains_key(symbol)
    }

    /// Number of symbols with at least one usable price.
    pub fn symbol_count(&self) -> usize {
        self.series.len()
    }

    /// Total bucketed prices across all symbols.
    pub fn total_entries(&self) -> usize {
        self.series.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
