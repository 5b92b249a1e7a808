use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::traits::{CashStore, HoldingStore, PortfolioStore};
use crate::errors::CoreError;
use crate::models::portfolio::{CashAccount, Holding, Portfolio, PortfolioId, UserId};

/// Serializable contents of an [`InMemoryLedgerStore`], used for seed files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSeed {
    #[serde(default)]
    pub portfolios: Vec<SeedPortfolio>,
}

/// One seeded portfolio with its holdings and cash accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedPortfolio {
    #[serde(flatten)]
    pub portfolio: Portfolio,
    #[serde(default)]
    pub holdings: Vec<Holding>,
    #[serde(default)]
    pub cash_accounts: Vec<CashAccount>,
}

#[derive(Debug, Clone)]
struct StoredPortfolio {
    portfolio: Portfolio,
    holdings: Vec<Holding>,
    cash_accounts: Vec<CashAccount>,
    /// Insertion sequence, for stable listing order.
    seq: u64,
}

/// In-memory implementation of the portfolio, holding and cash stores.
///
/// Thread-safe (DashMap); suitable for the demo server and tests.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    portfolios: DashMap<PortfolioId, StoredPortfolio>,
    next_seq: std::sync::atomic::AtomicU64,
}

impl InMemoryLedgerStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from parsed seed data.
    pub fn from_seed(seed: LedgerSeed) -> Self {
        let store = Self::new();
        for entry in seed.portfolios {
            let id = entry.portfolio.id;
            store.upsert_portfolio(entry.portfolio);
            store.set_holdings(id, entry.holdings);
            store.set_cash_accounts(id, entry.cash_accounts);
        }
        store
    }

    /// Parse a JSON seed document (`{"portfolios": [...]}`).
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let seed: LedgerSeed = serde_json::from_str(json)?;
        Ok(Self::from_seed(seed))
    }

    /// Insert or replace a portfolio record. Holdings and cash of an existing
    /// portfolio are kept.
    pub fn upsert_portfolio(&self, portfolio: Portfolio) {
        let seq = self
            .next_seq
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.portfolios
            .entry(portfolio.id)
            .and_modify(|stored| stored.portfolio = portfolio.clone())
            .or_insert_with(|| StoredPortfolio {
                portfolio,
                holdings: Vec::new(),
                cash_accounts: Vec::new(),
                seq,
            });
    }

    /// Replace the holdings of a known portfolio. Returns `false` for unknown ids.
    pub fn set_holdings(&self, portfolio_id: PortfolioId, holdings: Vec<Holding>) -> bool {
        match self.portfolios.get_mut(&portfolio_id) {
            Some(mut stored) => {
                stored.holdings = holdings;
                true
            }
            None => false,
        }
    }

    /// Replace the cash accounts of a known portfolio. Returns `false` for unknown ids.
    pub fn set_cash_accounts(&self, portfolio_id: PortfolioId, accounts: Vec<CashAccount>) -> bool {
        match self.portfolios.get_mut(&portfolio_id) {
            Some(mut stored) => {
                stored.cash_accounts = accounts;
                true
            }
            None => false,
        }
    }

    /// Remove a portfolio with its holdings and cash.
    pub fn delete_portfolio(&self, portfolio_id: PortfolioId) -> Option<Portfolio> {
        self.portfolios
            .remove(&portfolio_id)
            .map(|(_, stored)| stored.portfolio)
    }

    pub fn len(&self) -> usize {
        self.portfolios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.portfolios.is_empty()
    }
}

#[async_trait]
impl PortfolioStore for InMemoryLedgerStore {
    async fn list_portfolios(&self, user_id: UserId) -> Result<Vec<Portfolio>, CoreError> {
        let mut owned: Vec<(u64, Portfolio)> = self
            .portfolios
            .iter()
            .filter(|r| r.value().portfolio.user_id == user_id)
            .map(|r| (r.value().seq, r.value().portfolio.clone()))
            .collect();
        owned.sort_by_key(|(seq, _)| *seq);
        Ok(owned.into_iter().map(|(_, p)| p).collect())
    }

    async fn belongs_to_user(
        &self,
        portfolio_id: PortfolioId,
        user_id: UserId,
    ) -> Result<bool, CoreError> {
        Ok(self
            .portfolios
            .get(&portfolio_id)
            .is_some_and(|stored| stored.portfolio.user_id == user_id))
    }

    async fn get_portfolio(&self, portfolio_id: PortfolioId) -> Result<Portfolio, CoreError> {
        self.portfolios
            .get(&portfolio_id)
            .map(|stored| stored.portfolio.clone())
            .ok_or_else(|| CoreError::PortfolioNotFound(portfolio_id.to_string()))
    }
}

#[async_trait]
impl HoldingStore for InMemoryLedgerStore {
    async fn list_holdings(&self, portfolio_id: PortfolioId) -> Result<Vec<Holding>, CoreError> {
        Ok(self
            .portfolios
            .get(&portfolio_id)
            .map(|stored| stored.holdings.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl CashStore for InMemoryLedgerStore {
    async fn list_cash_accounts(
        &self,
        portfolio_id: PortfolioId,
    ) -> Result<Vec<CashAccount>, CoreError> {
        Ok(self
            .portfolios
            .get(&portfolio_id)
            .map(|stored| stored.cash_accounts.clone())
            .unwrap_or_default())
    }
}
