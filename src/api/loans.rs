//! Quotes for a prospective loan: borrowing capacity, bands and health.

use crate::api::AppState;
use crate::domain::{LoanPrices, MaxBorrowableTable};
use crate::error::AppError;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollateralQuery {
    pub collateral: String,
    pub range: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanQuery {
    pub collateral: String,
    pub debt: String,
    pub range: Option<u32>,
    pub full: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaxBorrowableResponse {
    pub range: u32,
    pub max_borrowable: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaxBorrowableAllResponse {
    pub max_borrowable: MaxBorrowableTable,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaxRangeResponse {
    pub max_range: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub health: String,
}

fn required_range(range: Option<u32>) -> Result<u32, AppError> {
    range.ok_or_else(|| AppError::BadRequest("range is required".into()))
}

pub async fn get_max_borrowable(
    Path(id): Path<String>,
    Query(params): Query<CollateralQuery>,
    State(state): State<AppState>,
) -> Result<Json<MaxBorrowableResponse>, AppError> {
    let engine = state.engine(&id)?;
    let range = required_range(params.range)?;
    let max_borrowable = engine.max_borrowable(&params.collateral, range).await?;
    Ok(Json(MaxBorrowableResponse {
        range,
        max_borrowable,
    }))
}

pub async fn get_max_borrowable_all(
    Path(id): Path<String>,
    Query(params): Query<CollateralQuery>,
    State(state): State<AppState>,
) -> Result<Json<MaxBorrowableAllResponse>, AppError> {
    let engine = state.engine(&id)?;
    let max_borrowable = engine.max_borrowable_all_ranges(&params.collateral).await?;
    Ok(Json(MaxBorrowableAllResponse { max_borrowable }))
}

pub async fn get_max_range(
    Path(id): Path<String>,
    Query(params): Query<LoanQuery>,
    State(state): State<AppState>,
) -> Result<Json<MaxRangeResponse>, AppError> {
    let engine = state.engine(&id)?;
    let max_range = engine.max_range(&params.collateral, &params.debt).await?;
    Ok(Json(MaxRangeResponse { max_range }))
}

pub async fn get_loan_bands(
    Path(id): Path<String>,
    Query(params): Query<LoanQuery>,
    State(state): State<AppState>,
) -> Result<Json<LoanPrices>, AppError> {
    let engine = state.engine(&id)?;
    let range = required_range(params.range)?;
    let prices = engine
        .create_loan_prices(&params.collateral, &params.debt, range)
        .await?;
    Ok(Json(prices))
}

pub async fn get_loan_health(
    Path(id): Path<String>,
    Query(params): Query<LoanQuery>,
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, AppError> {
    let engine = state.engine(&id)?;
    let range = required_range(params.range)?;
    let health = engine
        .create_loan_health(
            &params.collateral,
            &params.debt,
            range,
            params.full.unwrap_or(true),
        )
        .await?;
    Ok(Json(HealthResponse { health }))
}
