//! Route definitions for the human-in-the-loop subsystem.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::human;
use crate::state::AppState;

/// ```text
/// GET    /threads/{id}/human-requests           list_for_thread
/// POST   /threads/{id}/human-requests           create_request
/// GET    /threads/{id}/human-requests/pending   pending
/// POST   /human-requests/{id}/respond           respond
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/threads/{id}/human-requests",
            get(human::list_for_thread).post(human::create_request),
        )
        .route("/threads/{id}/human-requests/pending", get(human::pending))
        .route("/human-requests/{id}/respond", post(human::respond))
}
