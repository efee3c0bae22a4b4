//! Route definitions for usage metering queries, nested under `/usage`.

use axum::routing::get;
use axum::Router;

use crate::handlers::usage;
use crate::state::AppState;

/// ```text
/// GET    /current                   current usage period
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/current", get(usage::current))
}
