pub mod comments;
pub mod health;
pub mod history;
pub mod notifications;
pub mod trends;

use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .nest(
            "/api",
            trends::router()
                .merge(comments::router())
                .merge(notifications::router())
                .merge(history::router()),
        )
}
