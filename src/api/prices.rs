use crate::api::AppState;
use crate::domain::{Address, Decimal};
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsdPricesQuery {
    /// Comma-separated token addresses; every market token when absent.
    pub tokens: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsdPricesResponse {
    pub prices: BTreeMap<Address, Decimal>,
}

pub async fn get_usd_prices(
    Query(params): Query<UsdPricesQuery>,
    State(state): State<AppState>,
) -> Result<Json<UsdPricesResponse>, AppError> {
    let tokens: Vec<Address> = match params.tokens.as_deref() {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                Address::parse(s)
                    .map_err(|_| AppError::BadRequest(format!("Invalid token address: {}", s)))
            })
            .collect::<Result<_, _>>()?,
        None => state
            .registry
            .markets()
            .flat_map(|m| [m.borrowed_token.address.clone(), m.collateral_token.address.clone()])
            .collect(),
    };

    let table = state.prices.table().await?;
    let prices = tokens
        .into_iter()
        .map(|token| {
            let price = table.get(&token).copied().unwrap_or_else(Decimal::zero);
            (token, price)
        })
        .collect();
    Ok(Json(UsdPricesResponse { prices }))
}
