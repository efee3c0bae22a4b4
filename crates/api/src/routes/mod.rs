pub mod health;
pub mod human;
pub mod resources;
pub mod threads;
pub mod usage;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /resources                                  list, create
/// /resources/{id}                             get
/// /resources/{id}/working-copy                save (PUT)
/// /resources/{id}/steps                       working copy step graph
/// /resources/{id}/deploy                      publish release (POST)
/// /resources/{id}/adopt                       repoint current release (POST)
/// /resources/{id}/checkout                    restore release to working copy (POST)
/// /resources/{id}/releases                    release history
///
/// /threads                                    list, start (metered)
/// /threads/{id}                               get, delete
/// /threads/{id}/status                        transition (PATCH)
/// /threads/{id}/reply                         free-text reply (POST)
/// /threads/{id}/archive                       archive/unarchive (POST)
/// /threads/{id}/messages                      list, append (engine)
/// /threads/{id}/runs                          list, create (engine)
/// /threads/{id}/output-items                  list (?since_seq=), append (engine)
/// /runs/{id}                                  finish (PATCH, engine)
///
/// /threads/{id}/human-requests                list, raise
/// /threads/{id}/human-requests/pending        newest live request
/// /human-requests/{id}/respond                answer (POST)
///
/// /usage/current                              current usage period
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/resources", resources::router())
        .merge(threads::router())
        .merge(human::router())
        .nest("/usage", usage::router())
}
