use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::rooms::comments::Comment;
use crate::rooms::RoomKey;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/comments/{content_id}/{episode_id}", get(list_comments))
}

// ---------------------------------------------------------------------------
// GET /api/comments/{content_id}/{episode_id}
// ---------------------------------------------------------------------------

async fn list_comments(
    State(state): State<AppState>,
    Path((content_id, episode_id)): Path<(String, String)>,
) -> Json<Vec<Comment>> {
    let room = RoomKey::new(content_id, episode_id);
    Json(state.comments.list_for_room(&room))
}
