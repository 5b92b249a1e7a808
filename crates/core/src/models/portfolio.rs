use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub type PortfolioId = Uuid;
pub type UserId = Uuid;

/// The kind of account a portfolio represents. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortfolioType {
    #[default]
    Brokerage,
    Retirement,
    Savings,
    Crypto,
    Other,
}

impl std::fmt::Display for PortfolioType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortfolioType::Brokerage => write!(f, "Brokerage"),
            PortfolioType::Retirement => write!(f, "Retirement"),
            PortfolioType::Savings => write!(f, "Savings"),
            PortfolioType::Crypto => write!(f, "Crypto"),
            PortfolioType::Other => write!(f, "Other"),
        }
    }
}

/// A user's investment portfolio as the portfolio store returns it.
///
/// `currency` is carried through but never converted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: PortfolioId,
    pub user_id: UserId,
    pub name: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub portfolio_type: PortfolioType,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Portfolio {
    pub fn new(user_id: UserId, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            currency: default_currency(),
            portfolio_type: PortfolioType::default(),
        }
    }
}

/// Current quantity of one security in a portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub quantity: f64,
}

impl Holding {
    /// Symbols are trimmed and uppercased (e.g. " aapl " → "AAPL").
    pub fn new(symbol: impl Into<String>, quantity: f64) -> Self {
        Self {
            symbol: normalize_symbol(&symbol.into()),
            quantity,
        }
    }
}

/// A cash account balance. A portfolio's cash is the sum of its accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashAccount {
    pub balance: f64,
}

impl CashAccount {
    pub fn new(balance: f64) -> Self {
        Self { balance }
    }
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Everything the valuator needs to know about one portfolio: its record,
/// per-symbol quantities with duplicates summed, and its total cash.
///
/// Quantities are the *current* snapshot and are applied across the whole
/// requested range.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSnapshot {
    pub portfolio: Portfolio,
    pub quantities: BTreeMap<String, f64>,
    pub cash: f64,
}

impl PortfolioSnapshot {
    pub fn new(portfolio: Portfolio, holdings: &[Holding], cash_accounts: &[CashAccount]) -> Self {
        let mut quantities = BTreeMap::new();
        for holding in holdings {
            *quantities
                .entry(normalize_symbol(&holding.symbol))
                .or_insert(0.0) += holding.quantity;
        }
        let cash = cash_accounts.iter().map(|a| a.balance).sum();
        Self {
            portfolio,
            quantities,
            cash,
        }
    }

    pub fn has_positive_cash(&self) -> bool {
        self.cash > 0.0
    }

    /// A portfolio contributes to a chart if it holds at least one security or has positive cash.
    pub fn contributes(&self) -> bool {
        !self.quantities.is_empty() || self.has_positive_cash()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &String> {
        self.quantities.keys()
    }
}
