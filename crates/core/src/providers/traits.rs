use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::granularity::LookupWindow;
use crate::models::price::HistoryQuote;

/// Trait abstraction for remote price history sources.
///
/// Each API (Yahoo Finance, Alpha Vantage) implements this trait; the
/// performance pipeline only ever sees `dyn PriceHistoryProvider`. Calls are
/// independent and side-effect free, so implementations must be safe to call
/// concurrently from several tasks.
#[async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Daily close history of `symbol` over the trailing `window`.
    ///
    /// Quotes may come in any order and may include non-positive closes;
    /// callers filter and sort.
    async fn get_history(
        &self,
        symbol: &str,
        window: LookupWindow,
    ) -> Result<Vec<HistoryQuote>, CoreError>;
}
