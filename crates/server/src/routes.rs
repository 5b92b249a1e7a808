//! Route definitions.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use household_ledger_core::PerformanceService;

use crate::handlers::{self, AppState};

/// Create the API router.
pub fn create_router(performance: PerformanceService) -> Router {
    let state = Arc::new(AppState { performance });

    Router::new()
        // Health
        .route("/health", get(handlers::health))
        // Dashboard
        .route("/dashboard/performance", get(handlers::dashboard_performance))
        .with_state(state)
}
