use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::models::{ApiResponse, Notification};

use super::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListNotificationsQuery {
    pub limit: Option<usize>,
}

/// GET /api/v1/notifications/list
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
) -> Json<ApiResponse<Vec<Notification>>> {
    let limit = query
        .limit
        .unwrap_or(20)
        .clamp(1, state.config.notification_history.max(1));
    Json(ApiResponse::success(state.notifications.recent(limit).await))
}
