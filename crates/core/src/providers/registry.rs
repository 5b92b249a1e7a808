use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

use super::alphavantage::AlphaVantageProvider;
use super::traits::PriceHistoryProvider;
use super::yahoo_finance::YahooFinanceProvider;
use crate::errors::CoreError;
use crate::models::granularity::LookupWindow;
use crate::models::price::HistoryQuote;

/// Ordered chain of price history providers.
///
/// The registry is itself a `PriceHistoryProvider`: a request goes to each
/// provider in registration order and the first success wins. If every
/// provider fails, the last error is returned.
pub struct PriceProviderRegistry {
    providers: Vec<Box<dyn PriceHistoryProvider>>,
}

impl PriceProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Create a registry with all default providers pre-configured.
    pub fn new_with_defaults(api_keys: &HashMap<String, String>) -> Self {
        let mut registry = Self::new();

        // Yahoo Finance: NO API key needed (primary)
        match YahooFinanceProvider::new() {
            Ok(yahoo) => registry.register(Box::new(yahoo)),
            Err(e) => debug!(error = %e, "Yahoo Finance provider unavailable"),
        }

        // Alpha Vantage: requires API key (fallback)
        if let Some(key) = api_keys.get("alphavantage") {
            registry.register(Box::new(AlphaVantageProvider::new(key.clone())));
        }

        registry
    }

    /// Register a new price provider at the end of the chain.
    pub fn register(&mut self, provider: Box<dyn PriceHistoryProvider>) {
        self.providers.push(provider);
    }

    /// Names of registered providers, in fallback order.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for PriceProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceHistoryProvider for PriceProviderRegistry {
    fn name(&self) -> &str {
        "Provider Registry"
    }

    async fn get_history(
        &self,
        symbol: &str,
        window: LookupWindow,
    ) -> Result<Vec<HistoryQuote>, CoreError> {
        let mut last_error = None;
        for provider in &self.providers {
            match provider.get_history(symbol, window).await {
                Ok(quotes) => return Ok(quotes),
                Err(e) => {
                    debug!(provider = provider.name(), %symbol, error = %e, "falling back to next provider");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(CoreError::NoProvider))
    }
}
