//! Route definitions for the versioned resource lifecycle, nested under
//! `/resources`.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::resources;
use crate::state::AppState;

/// ```text
/// GET    /                          list_resources
/// POST   /                          create_resource
/// GET    /{id}                      get_resource
/// PUT    /{id}/working-copy         save_working_copy
/// GET    /{id}/steps                list_working_copy_steps
/// POST   /{id}/deploy               deploy
/// POST   /{id}/adopt                adopt
/// POST   /{id}/checkout             checkout
/// GET    /{id}/releases             list_releases
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(resources::list_resources).post(resources::create_resource))
        .route("/{id}", get(resources::get_resource))
        .route("/{id}/working-copy", put(resources::save_working_copy))
        .route("/{id}/steps", get(resources::list_working_copy_steps))
        .route("/{id}/deploy", post(resources::deploy))
        .route("/{id}/adopt", post(resources::adopt))
        .route("/{id}/checkout", post(resources::checkout))
        .route("/{id}/releases", get(resources::list_releases))
}
