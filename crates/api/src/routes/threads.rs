//! Route definitions for the thread lifecycle and execution-engine
//! callbacks.

use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::handlers::threads;
use crate::state::AppState;

/// ```text
/// GET    /threads                        list_threads
/// POST   /threads                        create_thread (metered)
/// GET    /threads/{id}                   get_thread
/// DELETE /threads/{id}                   delete_thread
/// PATCH  /threads/{id}/status            update_status
/// POST   /threads/{id}/reply             reply
/// POST   /threads/{id}/archive           set_archived
/// GET    /threads/{id}/messages          list_messages
/// POST   /threads/{id}/messages          create_message
/// GET    /threads/{id}/runs              list_runs
/// POST   /threads/{id}/runs              create_run
/// GET    /threads/{id}/output-items      list_output_items
/// POST   /threads/{id}/output-items      create_output_item
/// PATCH  /runs/{id}                      finish_run
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/threads", get(threads::list_threads).post(threads::create_thread))
        .route(
            "/threads/{id}",
            get(threads::get_thread).delete(threads::delete_thread),
        )
        .route("/threads/{id}/status", patch(threads::update_status))
        .route("/threads/{id}/reply", post(threads::reply))
        .route("/threads/{id}/archive", post(threads::set_archived))
        .route(
            "/threads/{id}/messages",
            get(threads::list_messages).post(threads::create_message),
        )
        .route(
            "/threads/{id}/runs",
            get(threads::list_runs).post(threads::create_run),
        )
        .route(
            "/threads/{id}/output-items",
            get(threads::list_output_items).post(threads::create_output_item),
        )
        .route("/runs/{id}", patch(threads::finish_run))
}
