use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::trends::TrendSnapshot;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/trends", get(current_trends))
}

async fn current_trends(State(state): State<AppState>) -> Json<Arc<TrendSnapshot>> {
    Json(state.trends.current())
}
