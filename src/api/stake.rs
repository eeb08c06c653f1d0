use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{error::Result, models::ApiResponse};

use super::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StakeRequest {
    /// Native amount, e.g. `"0.1"`. Falls back to the configured default.
    pub amount: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StakeResponse {
    pub tx_hash: String,
}

/// POST /api/v1/stake/submit
pub async fn submit(
    State(state): State<AppState>,
    Json(req): Json<StakeRequest>,
) -> Result<Json<ApiResponse<StakeResponse>>> {
    let tx_hash = state.dashboard.stake(req.amount.as_deref()).await?;
    Ok(Json(ApiResponse::success(StakeResponse {
        tx_hash: format!("{:#x}", tx_hash),
    })))
}
