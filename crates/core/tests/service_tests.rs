// ═══════════════════════════════════════════════════════════════════
// Service Tests — PriceFillState, ChartService stages, PriceService
// ═══════════════════════════════════════════════════════════════════

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use household_ledger_core::errors::CoreError;
use household_ledger_core::models::granularity::{DateRange, Granularity, LookupWindow};
use household_ledger_core::models::performance::PerformanceRequest;
use household_ledger_core::models::portfolio::{
    CashAccount, Holding, Portfolio, PortfolioSnapshot,
};
use household_ledger_core::models::price::{HistoryQuote, PriceSeriesCache};
use household_ledger_core::models::settings::PerformanceSettings;
use household_ledger_core::providers::traits::PriceHistoryProvider;
use household_ledger_core::services::chart_service::{BucketTotals, ChartService, PriceFillState};
use household_ledger_core::services::price_service::PriceService;

// ═══════════════════════════════════════════════════════════════════
// Mock Providers
// ═══════════════════════════════════════════════════════════════════

/// Serves fixed daily closes; unknown symbols fail.
struct MockHistoryProvider {
    history: HashMap<String, Vec<(NaiveDate, f64)>>,
    calls: AtomicUsize,
}

impl MockHistoryProvider {
    fn new(history: &[(&str, &[(NaiveDate, f64)])]) -> Self {
        Self {
            history: history
                .iter()
                .map(|(symbol, points)| (symbol.to_string(), points.to_vec()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PriceHistoryProvider for MockHistoryProvider {
    fn name(&self) -> &str {
        "MockHistory"
    }

    async fn get_history(
        &self,
        symbol: &str,
        _window: LookupWindow,
    ) -> Result<Vec<HistoryQuote>, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let points = self
            .history
            .get(symbol)
            .ok_or(CoreError::PriceNotAvailable {
                symbol: symbol.into(),
            })?;
        Ok(points
            .iter()
            .map(|(date, close)| {
                HistoryQuote::new(date.and_hms_opt(21, 0, 0).unwrap().and_utc(), *close)
            })
            .collect())
    }
}

/// Never answers within any reasonable timeout.
struct StallingProvider;

#[async_trait]
impl PriceHistoryProvider for StallingProvider {
    fn name(&self) -> &str {
        "Stalling"
    }

    async fn get_history(
        &self,
        _symbol: &str,
        _window: LookupWindow,
    ) -> Result<Vec<HistoryQuote>, CoreError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn axis(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

fn snapshot(holdings: &[(&str, f64)], cash: f64) -> PortfolioSnapshot {
    let holdings: Vec<Holding> = holdings.iter().map(|(s, q)| Holding::new(*s, *q)).collect();
    let cash = if cash == 0.0 {
        Vec::new()
    } else {
        vec![CashAccount::new(cash)]
    };
    PortfolioSnapshot::new(Portfolio::new(Uuid::new_v4(), "Test"), &holdings, &cash)
}

fn request(g: Granularity, start: NaiveDate, end: NaiveDate) -> PerformanceRequest {
    PerformanceRequest {
        granularity: g,
        range: DateRange::new(start, end).unwrap(),
        portfolio_id: None,
    }
}

fn symbols(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// ═══════════════════════════════════════════════════════════════════
// PriceFillState
// ═══════════════════════════════════════════════════════════════════

mod fill_state {
    use super::*;

    #[test]
    fn seeded_from_earliest_price() {
        let mut prices = PriceSeriesCache::new();
        prices.set_price("AAA", "2024-01-03", 110.0);
        prices.set_price("AAA", "2024-01-02", 100.0);
        let state = PriceFillState::seeded(&symbols(&["AAA", "ZZZ"]), &prices);
        assert_eq!(state.last_known("AAA"), Some(100.0));
        assert_eq!(state.last_known("ZZZ"), None);
    }

    #[test]
    fn exact_price_replaces_carried_price() {
        let mut prices = PriceSeriesCache::new();
        prices.set_price("AAA", "2024-01-01", 100.0);
        prices.set_price("AAA", "2024-01-03", 110.0);
        let mut state = PriceFillState::seeded(&symbols(&["AAA"]), &prices);

        assert_eq!(state.advance("AAA", "2024-01-01", &prices), Some(100.0));
        assert_eq!(state.advance("AAA", "2024-01-02", &prices), Some(100.0));
        assert_eq!(state.advance("AAA", "2024-01-03", &prices), Some(110.0));
        assert_eq!(state.advance("AAA", "2024-01-04", &prices), Some(110.0));
        assert_eq!(state.last_known("AAA"), Some(110.0));
    }

    #[test]
    fn unknown_symbol_has_no_price() {
        let prices = PriceSeriesCache::new();
        let mut state = PriceFillState::seeded(&symbols(&["ZZZ"]), &prices);
        assert_eq!(state.advance("ZZZ", "2024-01-01", &prices), None);
    }
}

// ═══════════════════════════════════════════════════════════════════
// ChartService — time axis
// ═══════════════════════════════════════════════════════════════════

mod time_axis {
    use super::*;

    #[test]
    fn union_of_all_symbols_sorted() {
        let mut prices = PriceSeriesCache::new();
        prices.set_price("A", "2024-01-03", 1.0);
        prices.set_price("B", "2024-01-01", 1.0);
        prices.set_price("B", "2024-01-03", 1.0);
        let range = DateRange::new(d(2024, 1, 1), d(2024, 1, 3)).unwrap();

        let keys = ChartService::new().build_time_axis(&prices, false, &range, Granularity::Daily);
        assert_eq!(keys, axis(&["2024-01-01", "2024-01-03"]));
    }

    #[test]
    fn synthesized_monthly_grid_for_cash_only() {
        let range = DateRange::new(d(2024, 1, 15), d(2024, 3, 10)).unwrap();
        let keys = ChartService::new().build_time_axis(
            &PriceSeriesCache::new(),
            true,
            &range,
            Granularity::Monthly,
        );
        assert_eq!(keys, axis(&["2024-01", "2024-02", "2024-03"]));
    }

    #[test]
    fn synthesized_weekly_grid_includes_end_bucket() {
        // Wed 2024-01-03 .. Mon 2024-01-15: stepping from the start lands on
        // 01-03, 01-10 and misses the week of the end date without the end key.
        let range = DateRange::new(d(2024, 1, 3), d(2024, 1, 15)).unwrap();
        let keys = ChartService::new().build_time_axis(
            &PriceSeriesCache::new(),
            true,
            &range,
            Granularity::Weekly,
        );
        assert_eq!(keys, axis(&["2024-01-07", "2024-01-14", "2024-01-21"]));
    }

    #[test]
    fn synthesized_daily_grid() {
        let range = DateRange::new(d(2024, 2, 28), d(2024, 3, 1)).unwrap();
        let keys = ChartService::new().build_time_axis(
            &PriceSeriesCache::new(),
            true,
            &range,
            Granularity::Daily,
        );
        assert_eq!(keys, axis(&["2024-02-28", "2024-02-29", "2024-03-01"]));
    }

    #[test]
    fn empty_without_prices_or_cash() {
        let range = DateRange::new(d(2024, 1, 1), d(2024, 3, 1)).unwrap();
        let keys = ChartService::new().build_time_axis(
            &PriceSeriesCache::new(),
            false,
            &range,
            Granularity::Daily,
        );
        assert!(keys.is_empty());
    }

    #[test]
    fn prices_take_precedence_over_grid() {
        let mut prices = PriceSeriesCache::new();
        prices.set_price("A", "2024-02", 1.0);
        let range = DateRange::new(d(2024, 1, 1), d(2024, 3, 31)).unwrap();
        let keys = ChartService::new().build_time_axis(&prices, true, &range, Granularity::Monthly);
        assert_eq!(keys, axis(&["2024-02"]));
    }
}

// ═══════════════════════════════════════════════════════════════════
// ChartService — valuation
// ═══════════════════════════════════════════════════════════════════

mod valuation {
    use super::*;

    #[test]
    fn forward_fill_between_observations() {
        let mut prices = PriceSeriesCache::new();
        prices.set_price("AAA", "2024-01-01", 100.0);
        prices.set_price("AAA", "2024-01-03", 110.0);
        let chart = ChartService::new();

        let totals = chart.value_portfolio(
            &snapshot(&[("AAA", 10.0)], 0.0),
            &axis(&["2024-01-01", "2024-01-02", "2024-01-03"]),
            &prices,
        );
        let values: Vec<f64> = totals.values().copied().collect();
        assert_eq!(values, [1000.0, 1000.0, 1100.0]);
    }

    #[test]
    fn backward_fill_before_first_observation() {
        let mut prices = PriceSeriesCache::new();
        prices.set_price("AAA", "2024-01-03", 50.0);
        prices.set_price("BBB", "2024-01-01", 1.0);

        let totals = ChartService::new().value_portfolio(
            &snapshot(&[("AAA", 2.0)], 0.0),
            &axis(&["2024-01-01", "2024-01-02", "2024-01-03"]),
            &prices,
        );
        assert_eq!(totals.len(), 3);
        assert!(totals.values().all(|v| *v == 100.0));
    }

    #[test]
    fn cash_added_to_every_bucket() {
        let mut prices = PriceSeriesCache::new();
        prices.set_price("AAA", "2024-01-01", 10.0);
        prices.set_price("AAA", "2024-01-02", 20.0);

        let totals = ChartService::new().value_portfolio(
            &snapshot(&[("AAA", 1.0)], 500.0),
            &axis(&["2024-01-01", "2024-01-02"]),
            &prices,
        );
        assert_eq!(totals["2024-01-01"], 510.0);
        assert_eq!(totals["2024-01-02"], 520.0);
    }

    #[test]
    fn unpriced_symbol_contributes_zero() {
        let mut prices = PriceSeriesCache::new();
        prices.set_price("AAA", "2024-01-01", 10.0);

        let totals = ChartService::new().value_portfolio(
            &snapshot(&[("AAA", 1.0), ("ZZZ", 1000.0)], 0.0),
            &axis(&["2024-01-01"]),
            &prices,
        );
        assert_eq!(totals["2024-01-01"], 10.0);
    }

    #[test]
    fn zero_totals_not_recorded() {
        let mut prices = PriceSeriesCache::new();
        prices.set_price("AAA", "2024-01-01", 10.0);

        let totals = ChartService::new().value_portfolio(
            &snapshot(&[("ZZZ", 5.0)], 0.0),
            &axis(&["2024-01-01"]),
            &prices,
        );
        assert!(totals.is_empty());
    }

    #[test]
    fn negative_cash_can_drop_buckets() {
        let mut prices = PriceSeriesCache::new();
        prices.set_price("AAA", "2024-01-01", 10.0);
        prices.set_price("AAA", "2024-01-02", 30.0);

        let totals = ChartService::new().value_portfolio(
            &snapshot(&[("AAA", 1.0)], -20.0),
            &axis(&["2024-01-01", "2024-01-02"]),
            &prices,
        );
        assert!(!totals.contains_key("2024-01-01"));
        assert_eq!(totals["2024-01-02"], 10.0);
    }
}

// ═══════════════════════════════════════════════════════════════════
// ChartService — aggregation & range filter
// ═══════════════════════════════════════════════════════════════════

mod aggregation {
    use super::*;

    fn totals(entries: &[(&str, f64)]) -> BucketTotals {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn key_wise_sum() {
        let a = totals(&[("2024-01-01", 100.0), ("2024-01-02", 110.0)]);
        let b = totals(&[("2024-01-02", 5.0), ("2024-01-03", 7.0)]);
        let combined = ChartService::new().aggregate_totals([&a, &b]);
        assert_eq!(
            combined,
            totals(&[("2024-01-01", 100.0), ("2024-01-02", 115.0), ("2024-01-03", 7.0)])
        );
    }

    #[test]
    fn filter_is_inclusive_on_bucket_keys() {
        let all = totals(&[
            ("2023-12", 1.0),
            ("2024-01", 2.0),
            ("2024-02", 3.0),
            ("2024-03", 4.0),
        ]);
        let range = DateRange::new(d(2024, 1, 20), d(2024, 2, 5)).unwrap();
        let points = ChartService::new().filter_to_range(&all, &range, Granularity::Monthly);
        let keys: Vec<&str> = points.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(keys, ["2024-01", "2024-02"]);
    }

    #[test]
    fn build_performance_aggregate_equals_breakdown_sum() {
        let mut prices = PriceSeriesCache::new();
        prices.set_price("AAA", "2024-01-01", 100.0);
        prices.set_price("AAA", "2024-01-03", 110.0);
        prices.set_price("BBB", "2024-01-02", 20.0);

        let snapshots = vec![
            snapshot(&[("AAA", 10.0)], 0.0),
            snapshot(&[("BBB", 3.0)], 40.0),
        ];
        let req = request(Granularity::Daily, d(2024, 1, 1), d(2024, 1, 3));
        let perf = ChartService::new().build_performance(&snapshots, &prices, &req);

        let breakdown = perf.portfolios.as_ref().unwrap();
        assert_eq!(breakdown.len(), 2);
        for point in &perf.data_points {
            let sum: f64 = breakdown
                .iter()
                .flat_map(|p| p.data_points.iter())
                .filter(|p| p.date == point.date)
                .map(|p| p.value)
                .sum();
            assert_eq!(sum, point.value, "bucket {}", point.date);
        }
        // 01-01: 1000 + 60 + 40; 01-03: 1100 + 60 + 40
        assert_eq!(perf.metrics.start_value, 1100.0);
        assert_eq!(perf.metrics.end_value, 1200.0);
    }

    #[test]
    fn build_performance_skips_non_contributing() {
        let mut prices = PriceSeriesCache::new();
        prices.set_price("AAA", "2024-01-01", 100.0);
        let snapshots = vec![snapshot(&[], 0.0), snapshot(&[("AAA", 1.0)], 0.0)];
        let req = request(Granularity::Daily, d(2024, 1, 1), d(2024, 1, 1));

        let perf = ChartService::new().build_performance(&snapshots, &prices, &req);
        assert_eq!(perf.portfolios.unwrap().len(), 1);
    }

    #[test]
    fn build_performance_omits_breakdown_for_single_portfolio() {
        let snap = snapshot(&[], 250.0);
        let req = PerformanceRequest {
            portfolio_id: Some(snap.portfolio.id),
            ..request(Granularity::Yearly, d(2023, 6, 1), d(2024, 6, 1))
        };
        let perf = ChartService::new().build_performance(&[snap], &PriceSeriesCache::new(), &req);
        assert!(perf.portfolios.is_none());
        assert_eq!(perf.data_points.len(), 2);
        assert_eq!(perf.metrics.change_pct, 0.0);
    }
}

// ═══════════════════════════════════════════════════════════════════
// PriceService
// ═══════════════════════════════════════════════════════════════════

mod price_service {
    use super::*;

    #[tokio::test]
    async fn builds_cache_for_every_symbol() {
        let provider = Arc::new(MockHistoryProvider::new(&[
            ("AAA", &[(d(2024, 1, 1), 100.0), (d(2024, 1, 2), 101.0)]),
            ("BBB", &[(d(2024, 1, 2), 50.0)]),
        ]));
        let service = PriceService::new(provider.clone());
        assert_eq!(service.provider_name(), "MockHistory");

        let cache = service
            .build_price_series(&symbols(&["AAA", "BBB"]), LookupWindow::OneMonth, Granularity::Daily)
            .await;
        assert_eq!(cache.symbol_count(), 2);
        assert_eq!(cache.price_at("AAA", "2024-01-02"), Some(101.0));
        assert_eq!(cache.price_at("BBB", "2024-01-02"), Some(50.0));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failing_symbol_is_skipped() {
        let provider = Arc::new(MockHistoryProvider::new(&[(
            "AAA",
            &[(d(2024, 1, 1), 100.0)],
        )]));
        let cache = PriceService::new(provider)
            .build_price_series(&symbols(&["AAA", "FAIL"]), LookupWindow::OneMonth, Granularity::Daily)
            .await;
        assert!(cache.contains_symbol("AAA"));
        assert!(!cache.contains_symbol("FAIL"));
    }

    #[tokio::test]
    async fn symbol_with_only_bad_closes_is_skipped() {
        let provider = Arc::new(MockHistoryProvider::new(&[(
            "AAA",
            &[(d(2024, 1, 1), 0.0), (d(2024, 1, 2), -1.0)],
        )]));
        let cache = PriceService::new(provider)
            .build_price_series(&symbols(&["AAA"]), LookupWindow::OneMonth, Granularity::Daily)
            .await;
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_fetch_times_out() {
        let settings = PerformanceSettings {
            symbol_fetch_timeout_secs: 1,
            ..Default::default()
        };
        let cache = PriceService::with_settings(Arc::new(StallingProvider), &settings)
            .build_price_series(&symbols(&["AAA", "BBB"]), LookupWindow::OneYear, Granularity::Weekly)
            .await;
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn result_independent_of_concurrency() {
        let history: Vec<(String, Vec<(NaiveDate, f64)>)> = (0..20)
            .map(|i| {
                (
                    format!("S{i:02}"),
                    vec![(d(2024, 1, 1), 10.0 + f64::from(i)), (d(2024, 1, 8), 20.0)],
                )
            })
            .collect();
        let borrowed: Vec<(&str, &[(NaiveDate, f64)])> = history
            .iter()
            .map(|(s, p)| (s.as_str(), p.as_slice()))
            .collect();
        let all: BTreeSet<String> = history.iter().map(|(s, _)| s.clone()).collect();

        let mut results = Vec::new();
        for concurrency in [1, 3, 20] {
            let settings = PerformanceSettings {
                max_concurrent_fetches: concurrency,
                ..Default::default()
            };
            let provider = Arc::new(MockHistoryProvider::new(&borrowed));
            let cache = PriceService::with_settings(provider, &settings)
                .build_price_series(&all, LookupWindow::OneMonth, Granularity::Daily)
                .await;
            results.push(cache.points());
        }
        assert_eq!(results[0], results[1]);
        assert_eq!(results[1], results[2]);
        assert_eq!(results[0].len(), 40);
    }

    #[tokio::test]
    async fn monthly_bucket_keeps_last_observation() {
        let provider = Arc::new(MockHistoryProvider::new(&[(
            "AAA",
            &[(d(2024, 1, 31), 130.0), (d(2024, 1, 2), 100.0)],
        )]));
        let cache = PriceService::new(provider)
            .build_price_series(&symbols(&["AAA"]), LookupWindow::SixMonths, Granularity::Monthly)
            .await;
        assert_eq!(cache.price_at("AAA", "2024-01"), Some(130.0));
    }
}
