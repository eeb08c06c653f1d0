use axum::{extract::State, Json};
use serde::Serialize;
use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub wallet: String,
    pub chain_id: Option<u64>,
    pub target_chain_id: u64,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let network = state.dashboard.network();
    let wallet_status = if state.dashboard.session().effective_address().is_some() {
        "connected".to_string()
    } else {
        "disconnected".to_string()
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        wallet: wallet_status,
        chain_id: network.active_chain.map(|chain| chain.id),
        target_chain_id: network.target_chain.id,
    })
}
