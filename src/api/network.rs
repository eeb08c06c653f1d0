use axum::{extract::State, Json};

use crate::{
    error::Result,
    models::{ApiResponse, NetworkView},
    services::chain_guard::SwitchOutcome,
};

use super::AppState;

/// GET /api/v1/network
pub async fn get_network(State(state): State<AppState>) -> Json<ApiResponse<NetworkView>> {
    Json(ApiResponse::success(state.dashboard.network()))
}

/// POST /api/v1/network/switch
pub async fn switch_network(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<SwitchOutcome>>> {
    let outcome = state.dashboard.switch_network().await?;
    Ok(Json(ApiResponse::success(outcome)))
}
