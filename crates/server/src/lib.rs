//! # Household Ledger Server
//!
//! HTTP surface of the portfolio valuation engine.
//!
//! - `GET /dashboard/performance`: net-worth chart, aggregate and per portfolio
//! - `GET /health`: liveness
//!
//! ## Usage
//!
//! ```ignore
//! use household_ledger_server::{Server, ServerConfig};
//!
//! let server = Server::new(config, service);
//! server.start().await?;
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod handlers;
pub mod routes;

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use household_ledger_core::PerformanceService;

pub use config::ServerConfig;

/// The Household Ledger HTTP server.
pub struct Server {
    config: ServerConfig,
    service: PerformanceService,
}

impl Server {
    /// Create a new server.
    pub fn new(config: ServerConfig, service: PerformanceService) -> Self {
        Self { config, service }
    }

    /// Build the router with tracing and CORS layers.
    pub fn router(service: PerformanceService) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        routes::create_router(service)
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Bind and serve until the process exits.
    pub async fn start(self) -> Result<(), std::io::Error> {
        let addr = SocketAddr::new(
            self.config.host.parse().unwrap_or([0, 0, 0, 0].into()),
            self.config.port,
        );
        info!("Starting Household Ledger server on {}", addr);

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, Self::router(self.service)).await
    }
}
