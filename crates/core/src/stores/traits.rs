use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::portfolio::{CashAccount, Holding, Portfolio, PortfolioId, UserId};

/// Read access to portfolio records.
#[async_trait]
pub trait PortfolioStore: Send + Sync {
    /// All portfolios owned by `user_id`, in a stable order.
    async fn list_portfolios(&self, user_id: UserId) -> Result<Vec<Portfolio>, CoreError>;

    /// `false` both for foreign and for unknown portfolio ids.
    async fn belongs_to_user(
        &self,
        portfolio_id: PortfolioId,
        user_id: UserId,
    ) -> Result<bool, CoreError>;

    async fn get_portfolio(&self, portfolio_id: PortfolioId) -> Result<Portfolio, CoreError>;
}

/// Current holdings of a portfolio.
#[async_trait]
pub trait HoldingStore: Send + Sync {
    async fn list_holdings(&self, portfolio_id: PortfolioId) -> Result<Vec<Holding>, CoreError>;
}

/// Cash accounts of a portfolio. Callers sum the balances.
#[async_trait]
pub trait CashStore: Send + Sync {
    async fn list_cash_accounts(
        &self,
        portfolio_id: PortfolioId,
    ) -> Result<Vec<CashAccount>, CoreError>;
}
