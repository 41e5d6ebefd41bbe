pub mod auth;
pub mod error;
pub mod income;
pub mod utils;
pub mod withdrawal;

use std::sync::Arc;

use axum::Router;
use tower_http::{
    compression::CompressionLayer, limit::RequestBodyLimitLayer,
    validate_request::ValidateRequestHeaderLayer,
};

use crate::banking::LedgerServices;
use auth::AuthService;

/// Request bodies are small JSON documents.
const BODY_LIMIT: usize = 64 * 1024;

/// Every `/v1` route, with the shared layers applied.
pub fn app_router(service: Arc<AuthService>, ledger: LedgerServices) -> Router {
    let ledger = Arc::new(ledger);

    let withdrawal_routes = withdrawal::withdrawal_routes(service.clone(), ledger.clone())
        .route_layer(ValidateRequestHeaderLayer::accept("application/json"));
    let income_routes = income::income_routes(service, ledger)
        .route_layer(ValidateRequestHeaderLayer::accept("application/json"))
        .route_layer(CompressionLayer::new().gzip(true));

    Router::new()
        .nest("/v1", withdrawal_routes.merge(income_routes))
        .route_layer(RequestBodyLimitLayer::new(BODY_LIMIT))
}
