//! Handlers for usage metering queries.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use stagehand_db::repositories::UsageRepo;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/usage/current
///
/// The tenant's current usage period, or `null` when no run has been
/// counted this period yet.
pub async fn current(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let period = UsageRepo::current_period(&state.pool, auth.tenant_id).await?;
    Ok(Json(DataResponse { data: period }))
}
