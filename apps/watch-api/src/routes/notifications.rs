//! Notification inbox endpoints.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::error::ApiError;
use crate::notifications::Notification;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications/{user_id}", get(list_notifications))
        .route(
            "/notifications/{user_id}/read/{notification_id}",
            post(mark_read),
        )
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub success: bool,
}

// ---------------------------------------------------------------------------
// GET /api/notifications/{user_id}
// ---------------------------------------------------------------------------

async fn list_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<Vec<Notification>> {
    Json(state.notifications.list_for(&user_id))
}

// ---------------------------------------------------------------------------
// POST /api/notifications/{user_id}/read/{notification_id}
// ---------------------------------------------------------------------------

async fn mark_read(
    State(state): State<AppState>,
    Path((user_id, notification_id)): Path<(String, String)>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    if !state.notifications.mark_read(&user_id, &notification_id) {
        return Err(ApiError::not_found("Notification not found"));
    }
    Ok(Json(MarkReadResponse { success: true }))
}
