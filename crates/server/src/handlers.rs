//! Request handlers.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRequestParts, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use household_ledger_core::{AggregatePerformance, CoreError, PerformanceQuery, PerformanceService};

/// Header carrying the authenticated caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Application state.
pub struct AppState {
    /// Performance pipeline, shared by all requests
    pub performance: PerformanceService,
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

/// Health check handler.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Error response body.
#[derive(Serialize)]
pub struct ErrorResponse {
    error: String,
}

/// Errors a handler can return, mapped to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing or invalid x-user-id header")]
    Unauthenticated,

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Core(CoreError::ValidationError(_)) => StatusCode::BAD_REQUEST,
            ApiError::Core(CoreError::Unauthorized(_)) => StatusCode::FORBIDDEN,
            ApiError::Core(CoreError::PortfolioNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Core(CoreError::Cancelled) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// The caller's user id, taken from the [`USER_ID_HEADER`] header.
///
/// Session handling lives in front of this service; by the time a request
/// arrives here the header has been set by the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<Uuid>().ok())
            .map(CallerId)
            .ok_or(ApiError::Unauthenticated)
    }
}

/// Portfolio value chart for the dashboard.
///
/// `GET /dashboard/performance?period=&portfolio_id=&start_date=&end_date=`
pub async fn dashboard_performance(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    Query(query): Query<PerformanceQuery>,
) -> Result<Json<AggregatePerformance>, ApiError> {
    let performance = state.performance.compute(user_id, &query).await?;
    Ok(Json(performance))
}
