use thiserror::Error;

/// Unified error type for the entire household-ledger-core library.
/// Every public function returns `Result<T, CoreError>`.
///
/// Only request-shape problems (`ValidationError`, `Unauthorized`) are meant to
/// reach the caller of a performance request. Provider failures are absorbed
/// per symbol by the price series builder.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Request shape ───────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Portfolio {0} does not belong to the caller")]
    Unauthorized(String),

    #[error("Portfolio not found: {0}")]
    PortfolioNotFound(String),

    // ── API / Network ───────────────────────────────────────────────
    #[error("API error ({provider}): {message}")]
    Api {
        provider: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("No price history provider registered")]
    NoProvider,

    #[error("Price history not available for {symbol}")]
    PriceNotAvailable { symbol: String },

    // ── Collaborators / Runtime ─────────────────────────────────────
    #[error("Store error: {0}")]
    Store(String),

    #[error("Request cancelled before completion")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CoreError {
    /// `true` for errors caused by the request itself rather than by a collaborator.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CoreError::ValidationError(_) | CoreError::Unauthorized(_)
        )
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Config(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // Strip query parameters: reqwest errors carry full URLs, API keys included.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };
        CoreError::Network(sanitized)
    }
}
