pub mod health;
pub mod loans;
pub mod markets;
pub mod prices;
pub mod users;

use crate::engine::{MarketEngine, UsdPriceBook};
use crate::error::AppError;
use crate::orchestration::MarketRegistry;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Debug, Clone)]
pub struct AppState {
    pub registry: Arc<MarketRegistry>,
    pub prices: UsdPriceBook,
}

impl AppState {
    pub fn new(registry: Arc<MarketRegistry>, prices: UsdPriceBook) -> Self {
        Self { registry, prices }
    }

    pub(crate) fn engine(&self, id: &str) -> Result<&MarketEngine, AppError> {
        self.registry
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("market {}", id)))
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/markets", get(markets::list_markets))
        .route("/v1/markets/:id/stats", get(markets::get_stats))
        .route("/v1/markets/:id/bands/:n", get(markets::get_band))
        .route("/v1/markets/:id/max-borrowable", get(loans::get_max_borrowable))
        .route(
            "/v1/markets/:id/max-borrowable/all",
            get(loans::get_max_borrowable_all),
        )
        .route("/v1/markets/:id/max-range", get(loans::get_max_range))
        .route("/v1/markets/:id/loan-bands", get(loans::get_loan_bands))
        .route("/v1/markets/:id/loan-health", get(loans::get_loan_health))
        .route("/v1/markets/:id/users/:address", get(users::get_user))
        .route("/v1/prices/usd", get(prices::get_usd_prices))
        .layer(cors)
        .with_state(state)
}
