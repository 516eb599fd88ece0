//! Market listing, stats snapshot and per-band detail.

use crate::api::AppState;
use crate::domain::{BandBalances, Decimal, Market, MarketStats};
use crate::error::AppError;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketsResponse {
    pub markets: Vec<Market>,
}

pub async fn list_markets(State(state): State<AppState>) -> Json<MarketsResponse> {
    Json(MarketsResponse {
        markets: state.registry.markets().cloned().collect(),
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    /// Clear the cache and read everything afresh.
    pub refresh: Option<bool>,
}

pub async fn get_stats(
    Path(id): Path<String>,
    Query(params): Query<StatsQuery>,
    State(state): State<AppState>,
) -> Result<Json<MarketStats>, AppError> {
    let engine = state.engine(&id)?;
    let stats = if params.refresh.unwrap_or(false) {
        engine.refresh_stats().await?
    } else {
        engine.stats().await?
    };
    Ok(Json(stats))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandResponse {
    pub n: i64,
    /// Computed `[lower, upper]` price bounds.
    pub prices: [Decimal; 2],
    pub balances: BandBalances,
}

pub async fn get_band(
    Path((id, n)): Path<(String, i64)>,
    State(state): State<AppState>,
) -> Result<Json<BandResponse>, AppError> {
    let engine = state.engine(&id)?;
    let (prices, balances) =
        futures::try_join!(engine.calc_band_prices(n), engine.band_balances(n))?;
    Ok(Json(BandResponse {
        n,
        prices,
        balances,
    }))
}
