//! Handlers for human-in-the-loop requests and responses.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use stagehand_core::types::DbId;
use stagehand_db::models::human_request::{CreateHumanRequest, CreateHumanResponse};
use stagehand_db::repositories::HumanRequestRepo;
use stagehand_events::{ThreadEvent, EVENT_HUMAN_REQUEST_CREATED, EVENT_HUMAN_REQUEST_RESOLVED};

use crate::error::AppResult;
use crate::handlers::threads::ensure_thread_exists;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/threads/{id}/human-requests
///
/// Raise an approval or input request on a thread. Expiry, if any, is
/// fixed now from `timeout_ms`; the caller is expected to move the
/// thread to `waiting_human` via the status endpoint.
pub async fn create_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(thread_id): Path<DbId>,
    Json(input): Json<CreateHumanRequest>,
) -> AppResult<impl IntoResponse> {
    let request =
        HumanRequestRepo::create_and_increment_seq(&state.pool, auth.tenant_id, thread_id, &input)
            .await?;

    state.event_bus.publish(
        ThreadEvent::new(EVENT_HUMAN_REQUEST_CREATED, auth.tenant_id, thread_id, request.seq)
            .with_payload(serde_json::json!({
                "request_id": request.id,
                "kind": request.kind,
            })),
    );

    tracing::info!(
        tenant_id = auth.tenant_id,
        thread_id,
        request_id = request.id,
        kind = %request.kind,
        "Human request raised"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: request })))
}

/// POST /api/v1/human-requests/{id}/respond
///
/// Answer a request. Responding to an already-decided request is a safe
/// no-op flagged `already_decided`, so retries succeed.
pub async fn respond(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(request_id): Path<DbId>,
    Json(input): Json<CreateHumanResponse>,
) -> AppResult<impl IntoResponse> {
    let ambient_user = auth.identity().attributed_user();
    let outcome = HumanRequestRepo::create_response(
        &state.pool,
        auth.tenant_id,
        request_id,
        &input,
        ambient_user,
    )
    .await?;

    if let (false, Some(seq)) = (outcome.already_decided, outcome.seq) {
        state.event_bus.publish(
            ThreadEvent::new(
                EVENT_HUMAN_REQUEST_RESOLVED,
                auth.tenant_id,
                outcome.thread_id,
                seq,
            )
            .with_actor(auth.user_id)
            .with_payload(serde_json::json!({
                "request_id": request_id,
                "status": outcome.request_status,
            })),
        );
    }

    Ok(Json(DataResponse { data: outcome }))
}

/// GET /api/v1/threads/{id}/human-requests/pending
///
/// The newest genuinely pending request, if any. A pending row past its
/// expiry does not count.
pub async fn pending(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(thread_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    ensure_thread_exists(&state, auth.tenant_id, thread_id).await?;
    let request =
        HumanRequestRepo::pending_by_thread(&state.pool, auth.tenant_id, thread_id).await?;
    Ok(Json(DataResponse { data: request }))
}

/// GET /api/v1/threads/{id}/human-requests
///
/// Full request history with effective (expiry-applied) statuses.
pub async fn list_for_thread(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(thread_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    ensure_thread_exists(&state, auth.tenant_id, thread_id).await?;
    let requests = HumanRequestRepo::list_for_thread(&state.pool, thread_id).await?;
    Ok(Json(DataResponse { data: requests }))
}
