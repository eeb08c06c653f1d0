use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::models::{ApiResponse, DashboardView};

use super::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    /// Wait for pending reads instead of returning `loading`.
    pub settle: Option<bool>,
    /// Drop cached results (including failures) before rendering.
    pub refresh: Option<bool>,
}

/// GET /api/v1/dashboard
pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Json<ApiResponse<DashboardView>> {
    if query.refresh.unwrap_or(false) {
        state.dashboard.refresh();
    }
    let view = if query.settle.unwrap_or(false) {
        state.dashboard.view_settled().await
    } else {
        state.dashboard.view()
    };
    Json(ApiResponse::success(view))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::test_app;
    use crate::services::testing::chain;
    use ethers::types::Address;

    #[tokio::test]
    async fn settled_dashboard_serializes_panels() {
        let app = test_app(Some(Address::repeat_byte(9)), Some(chain(1, "Ethereum"))).await;
        let query = DashboardQuery {
            settle: Some(true),
            refresh: None,
        };

        let Json(response) = get_dashboard(State(app.state), Query(query)).await;
        let json = serde_json::to_value(&response).expect("serializes");
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["view"], "ready");
        assert_eq!(json["data"]["staked"]["status"], "ready");
        assert_eq!(json["data"]["staked"]["value"], "0.25");
        assert_eq!(json["data"]["total_staked"]["value"], "1,000");
        assert_eq!(json["data"]["total_staked"]["label"], "Total staked on Lido");
    }

    #[tokio::test]
    async fn wrong_chain_serializes_modal_only() {
        let app = test_app(Some(Address::repeat_byte(9)), Some(chain(5, "Goerli"))).await;

        let Json(response) =
            get_dashboard(State(app.state), Query(DashboardQuery::default())).await;
        let json = serde_json::to_value(&response).expect("serializes");
        assert_eq!(json["data"]["view"], "blocked");
        assert_eq!(json["data"]["modal"]["title"], "Connect your wallet to Ethereum");
        assert!(json["data"].get("staked").is_none());
        assert!(app.transport.read_calls().is_empty());
    }
}
