use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::models::granularity::{DateRange, Granularity};
use crate::models::performance::{
    AggregatePerformance, PerformanceMetrics, PerformanceRequest, PortfolioPerformance, ValuePoint,
};
use crate::models::portfolio::PortfolioSnapshot;
use crate::models::price::PriceSeriesCache;

/// Per-bucket portfolio totals before range filtering, keyed by bucket key.
pub type BucketTotals = BTreeMap<String, f64>;

/// Last known price of each symbol, carried through an ordered fold over the time axis.
///
/// Seeded with each symbol's *earliest* observed price, so buckets before the
/// first observation are backward-filled; every exact observation then
/// replaces the carried price, so later gaps are forward-filled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceFillState {
    last_known: HashMap<String, f64>,
}

impl PriceFillState {
    /// Seed the state for `symbols` from their earliest cached prices.
    /// Symbols without any price stay unseeded and value at zero.
    pub fn seeded<'a>(
        symbols: impl IntoIterator<Item = &'a String>,
        prices: &PriceSeriesCache,
    ) -> Self {
        let last_known = symbols
            .into_iter()
            .filter_map(|symbol| Some((symbol.clone(), prices.earliest_price(symbol)?)))
            .collect();
        Self { last_known }
    }

    /// Price of `symbol` at `bucket_key`: the exact observation if any
    /// (which becomes the new carried price), else the carried price.
    pub fn advance(
        &mut self,
        symbol: &str,
        bucket_key: &str,
        prices: &PriceSeriesCache,
    ) -> Option<f64> {
        match prices.price_at(symbol, bucket_key) {
            Some(price) => {
                self.last_known.insert(symbol.to_string(), price);
                Some(price)
            }
            None => self.last_known.get(symbol).copied(),
        }
    }

    pub fn last_known(&self, symbol: &str) -> Option<f64> {
        self.last_known.get(symbol).copied()
    }
}

/// Turns bucketed prices and portfolio snapshots into value series.
///
/// Pure computation over data already fetched: no I/O, no API calls.
/// The stages are exposed separately so each can be tested on its own:
/// 1. [`build_time_axis`](Self::build_time_axis): the sorted bucket keys to value
/// 2. [`value_portfolio`](Self::value_portfolio): one portfolio's totals per bucket
/// 3. [`aggregate_totals`](Self::aggregate_totals): key-wise sum across portfolios
/// 4. [`filter_to_range`](Self::filter_to_range): clamp to the requested range
pub struct ChartService;

impl ChartService {
    pub fn new() -> Self {
        Self
    }

    /// Sorted union of every bucket key with a price.
    ///
    /// With no prices at all and some positive cash, a regular grid from
    /// `range.start` to `range.end` is synthesized instead so cash-only
    /// portfolios still chart. With neither, the axis is empty.
    pub fn build_time_axis(
        &self,
        prices: &PriceSeriesCache,
        any_positive_cash: bool,
        range: &DateRange,
        granularity: Granularity,
    ) -> Vec<String> {
        let mut keys = prices.bucket_keys();
        if keys.is_empty() && any_positive_cash {
            keys = Self::synthesize_axis(range, granularity);
        }
        keys.into_iter().collect()
    }

    /// One bucket key per granularity step from start to end, end always included.
    fn synthesize_axis(range: &DateRange, granularity: Granularity) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();
        let mut cursor = Some(range.start);
        while let Some(date) = cursor {
            if date > range.end {
                break;
            }
            keys.insert(granularity.bucket_key(date));
            cursor = granularity.step(date);
        }
        keys.insert(granularity.bucket_key(range.end));
        keys
    }

    /// Value one portfolio at every bucket of `axis`.
    ///
    /// Each bucket is `Σ quantity × filled price + cash`. A symbol with no
    /// price anywhere contributes zero. Only strictly positive totals are
    /// recorded; the result is not yet clamped to the requested range.
    pub fn value_portfolio(
        &self,
        snapshot: &PortfolioSnapshot,
        axis: &[String],
        prices: &PriceSeriesCache,
    ) -> BucketTotals {
        let state = PriceFillState::seeded(snapshot.symbols(), prices);

        let (_, totals) = axis.iter().fold(
            (state, BucketTotals::new()),
            |(mut state, mut totals), bucket_key| {
                let holdings_value: f64 = snapshot
                    .quantities
                    .iter()
                    .map(|(symbol, quantity)| {
                        quantity * state.advance(symbol, bucket_key, prices).unwrap_or(0.0)
                    })
                    .sum();
                let total = holdings_value + snapshot.cash;
                if total > 0.0 {
                    totals.insert(bucket_key.clone(), total);
                }
                (state, totals)
            },
        );
        totals
    }

    /// Key-wise sum of several portfolios' bucket totals. A portfolio missing
    /// a bucket contributes nothing to it.
    pub fn aggregate_totals<'a>(
        &self,
        per_portfolio: impl IntoIterator<Item = &'a BucketTotals>,
    ) -> BucketTotals {
        let mut combined = BucketTotals::new();
        for totals in per_portfolio {
            for (key, value) in totals {
                *combined.entry(key.clone()).or_insert(0.0) += value;
            }
        }
        combined
    }

    /// Points whose key lies within `[bucket_key(start), bucket_key(end)]`, in order.
    pub fn filter_to_range(
        &self,
        totals: &BucketTotals,
        range: &DateRange,
        granularity: Granularity,
    ) -> Vec<ValuePoint> {
        let (low, high) = range.key_bounds(granularity);
        totals
            .iter()
            .filter(|(key, _)| key.as_str() >= low.as_str() && key.as_str() <= high.as_str())
            .map(|(key, value)| ValuePoint::new(key.clone(), *value))
            .collect()
    }

    /// Run the axis, valuation and aggregation stages for a set of snapshots.
    ///
    /// Non-contributing portfolios (no holdings, no positive cash) are left
    /// out of both the aggregate and the breakdown. The breakdown is omitted
    /// when the request targeted one specific portfolio.
    pub fn build_performance(
        &self,
        snapshots: &[PortfolioSnapshot],
        prices: &PriceSeriesCache,
        request: &PerformanceRequest,
    ) -> AggregatePerformance {
        let granularity = request.granularity;
        let range = &request.range;

        let contributing: Vec<&PortfolioSnapshot> =
            snapshots.iter().filter(|s| s.contributes()).collect();
        let any_positive_cash = contributing.iter().any(|s| s.has_positive_cash());
        let axis = self.build_time_axis(prices, any_positive_cash, range, granularity);

        let mut breakdown = Vec::with_capacity(contributing.len());
        let mut all_totals = Vec::with_capacity(contributing.len());
        for snapshot in contributing {
            let totals = self.value_portfolio(snapshot, &axis, prices);
            let data_points = self.filter_to_range(&totals, range, granularity);
            breakdown.push(PortfolioPerformance {
                id: snapshot.portfolio.id,
                name: snapshot.portfolio.name.clone(),
                metrics: PerformanceMetrics::from_series(&data_points),
                data_points,
            });
            all_totals.push(totals);
        }

        let combined = self.aggregate_totals(&all_totals);
        let data_points = self.filter_to_range(&combined, range, granularity);

        AggregatePerformance {
            period: granularity,
            metrics: PerformanceMetrics::from_series(&data_points),
            data_points,
            portfolios: request.portfolio_id.is_none().then_some(breakdown),
        }
    }
}

impl Default for ChartService {
    fn default() -> Self {
        Self::new()
    }
}
