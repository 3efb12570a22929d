//! Watch history and release-subscription endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{require_non_blank, ApiError};
use crate::history::WatchEntry;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/history/{user_id}", get(list_history).post(record_watch))
        .route(
            "/subscriptions/{user_id}",
            get(list_subscriptions).post(subscribe),
        )
        .route("/subscriptions/{user_id}/{content_id}", delete(unsubscribe))
}

// ---------------------------------------------------------------------------
// /api/history/{user_id}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordWatchRequest {
    pub content_id: String,
    pub episode_id: String,
    #[serde(default)]
    pub position: u64,
}

async fn record_watch(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<RecordWatchRequest>,
) -> Result<StatusCode, ApiError> {
    require_non_blank(&[
        ("contentId", body.content_id.as_str()),
        ("episodeId", body.episode_id.as_str()),
    ])?;

    state.history.record(
        &user_id,
        WatchEntry {
            content_id: body.content_id,
            episode_id: body.episode_id,
            watched_at: Utc::now(),
            position: body.position,
        },
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn list_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<Vec<WatchEntry>> {
    Json(state.history.list(&user_id))
}

// ---------------------------------------------------------------------------
// /api/subscriptions/{user_id}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub content_id: String,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionsResponse {
    pub subscriptions: Vec<String>,
}

async fn subscribe(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<SubscriptionsResponse>), ApiError> {
    require_non_blank(&[("contentId", body.content_id.as_str())])?;

    let created = state.subscriptions.subscribe(&user_id, &body.content_id);
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(SubscriptionsResponse {
            subscriptions: state.subscriptions.list(&user_id),
        }),
    ))
}

async fn unsubscribe(
    State(state): State<AppState>,
    Path((user_id, content_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    if !state.subscriptions.unsubscribe(&user_id, &content_id) {
        return Err(ApiError::not_found("Subscription not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn list_subscriptions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<SubscriptionsResponse> {
    Json(SubscriptionsResponse {
        subscriptions: state.subscriptions.list(&user_id),
    })
}
