use crate::api::AppState;
use crate::domain::{Address, UserPosition};
use crate::error::AppError;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub address: Address,
    pub position: UserPosition,
    pub health: String,
}

pub async fn get_user(
    Path((id, address)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, AppError> {
    let engine = state.engine(&id)?;
    let address = Address::parse(&address)
        .map_err(|_| AppError::BadRequest("Invalid user address".into()))?;

    let position = engine
        .user_position(&address)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no loan for {} in {}", address, id)))?;
    let health = engine.user_health(&address, true).await?;

    Ok(Json(UserResponse {
        address,
        position,
        health,
    }))
}
