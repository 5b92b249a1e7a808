use chrono::{NaiveDate, Utc};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::chart_service::ChartService;
use super::price_service::PriceService;
use crate::errors::CoreError;
use crate::models::granularity::LookupWindow;
use crate::models::performance::{AggregatePerformance, PerformanceQuery};
use crate::models::portfolio::{Portfolio, PortfolioId, PortfolioSnapshot, UserId};
use crate::models::settings::PerformanceSettings;
use crate::providers::registry::PriceProviderRegistry;
use crate::providers::traits::PriceHistoryProvider;
use crate::stores::traits::{CashStore, HoldingStore, PortfolioStore};

/// Drives one performance request end to end:
///
/// 1. Resolve the query into granularity, date range and optional portfolio filter
/// 2. Load the in-scope portfolios (rejecting a portfolio the caller does not own)
/// 3. Load holdings and cash of each portfolio
/// 4. Fetch and bucket price history of every held symbol
/// 5. Value, aggregate and clamp to the range
///
/// Only steps 1 and 2 can fail the request on their own; price data problems
/// degrade to missing symbols. No state survives between requests.
pub struct PerformanceService {
    portfolio_store: Arc<dyn PortfolioStore>,
    holding_store: Arc<dyn HoldingStore>,
    cash_store: Arc<dyn CashStore>,
    price_service: PriceService,
    chart_service: ChartService,
    settings: PerformanceSettings,
}

impl PerformanceService {
    pub fn new(
        portfolio_store: Arc<dyn PortfolioStore>,
        holding_store: Arc<dyn HoldingStore>,
        cash_store: Arc<dyn CashStore>,
        provider: Arc<dyn PriceHistoryProvider>,
        settings: PerformanceSettings,
    ) -> Self {
        Self {
            portfolio_store,
            holding_store,
            cash_store,
            price_service: PriceService::with_settings(provider, &settings),
            chart_service: ChartService::new(),
            settings,
        }
    }

    /// Build from one object serving all three stores.
    pub fn from_store<S>(
        store: Arc<S>,
        provider: Arc<dyn PriceHistoryProvider>,
        settings: PerformanceSettings,
    ) -> Self
    where
        S: PortfolioStore + HoldingStore + CashStore + 'static,
    {
        Self::new(store.clone(), store.clone(), store, provider, settings)
    }

    /// Build with the default provider chain configured from `settings.api_keys`.
    pub fn with_default_providers<S>(store: Arc<S>, settings: PerformanceSettings) -> Self
    where
        S: PortfolioStore + HoldingStore + CashStore + 'static,
    {
        let registry = PriceProviderRegistry::new_with_defaults(&settings.api_keys);
        Self::from_store(store, Arc::new(registry), settings)
    }

    pub fn settings(&self) -> &PerformanceSettings {
        &self.settings
    }

    /// Compute a performance chart for `user_id`, bounded by the configured request timeout.
    pub async fn compute(
        &self,
        user_id: UserId,
        query: &PerformanceQuery,
    ) -> Result<AggregatePerformance, CoreError> {
        self.compute_until(user_id, query, std::future::pending())
            .await
    }

    /// Like [`compute`](Self::compute), but also abandons the request as soon
    /// as `cancel` completes. A cancelled or timed-out request returns
    /// `CoreError::Cancelled` and no partial result.
    pub async fn compute_until<F>(
        &self,
        user_id: UserId,
        query: &PerformanceQuery,
        cancel: F,
    ) -> Result<AggregatePerformance, CoreError>
    where
        F: Future<Output = ()>,
    {
        let today = Utc::now().date_naive();
        let deadline = self.settings.request_timeout();

        tokio::select! {
            outcome = tokio::time::timeout(deadline, self.compute_at(user_id, query, today)) => {
                match outcome {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(%user_id, timeout_secs = deadline.as_secs(), "performance request timed out");
                        Err(CoreError::Cancelled)
                    }
                }
            }
            _ = cancel => {
                warn!(%user_id, "performance request cancelled by caller");
                Err(CoreError::Cancelled)
            }
        }
    }

    /// Run the pipeline with `today` as the reference date, without any deadline.
    pub async fn compute_at(
        &self,
        user_id: UserId,
        query: &PerformanceQuery,
        today: NaiveDate,
    ) -> Result<AggregatePerformance, CoreError> {
        let request = query.resolve(today)?;
        let window = LookupWindow::covering(&request.range, today);
        let days_back = (today - request.range.start).num_days();
        if days_back > i64::try_from(window.days()).unwrap_or(i64::MAX) {
            warn!(
                start = %request.range.start,
                days_back,
                %window,
                "range starts before the widest lookup window; early buckets may be missing"
            );
        }
        debug!(
            granularity = %request.granularity,
            start = %request.range.start,
            end = %request.range.end,
            %window,
            "resolved performance request"
        );

        let portfolios = self.load_portfolios(user_id, request.portfolio_id).await?;
        let snapshots = self.load_snapshots(portfolios).await?;

        let symbols: BTreeSet<String> = snapshots
            .iter()
            .filter(|s| s.contributes())
            .flat_map(|s| s.symbols().cloned())
            .collect();

        let prices = self
            .price_service
            .build_price_series(&symbols, window, request.granularity)
            .await;

        let performance = self
            .chart_service
            .build_performance(&snapshots, &prices, &request);

        info!(
            %user_id,
            portfolios = snapshots.len(),
            symbols = symbols.len(),
            priced_symbols = prices.symbol_count(),
            price_buckets = prices.total_entries(),
            points = performance.data_points.len(),
            "computed portfolio performance"
        );
        Ok(performance)
    }

    /// All of the caller's portfolios, or just the requested one if the caller owns it.
    async fn load_portfolios(
        &self,
        user_id: UserId,
        portfolio_id: Option<PortfolioId>,
    ) -> Result<Vec<Portfolio>, CoreError> {
        let Some(portfolio_id) = portfolio_id else {
            return self.portfolio_store.list_portfolios(user_id).await;
        };

        if !self
            .portfolio_store
            .belongs_to_user(portfolio_id, user_id)
            .await?
        {
            return Err(CoreError::Unauthorized(portfolio_id.to_string()));
        }
        let portfolio = self.portfolio_store.get_portfolio(portfolio_id).await?;
        Ok(vec![portfolio])
    }

    async fn load_snapshots(
        &self,
        portfolios: Vec<Portfolio>,
    ) -> Result<Vec<PortfolioSnapshot>, CoreError> {
        let mut snapshots = Vec::with_capacity(portfolios.len());
        for portfolio in portfolios {
            let (holdings, cash_accounts) = futures::try_join!(
                self.holding_store.list_holdings(portfolio.id),
                self.cash_store.list_cash_accounts(portfolio.id),
            )?;
            snapshots.push(PortfolioSnapshot::new(portfolio, &holdings, &cash_accounts));
        }
        Ok(snapshots)
    }
}
