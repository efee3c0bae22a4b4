//! Handlers for thread lifecycle, replies, and execution-engine
//! callbacks (messages, runs, output items).
//!
//! Every sequenced mutation publishes a [`ThreadEvent`] stamped with the
//! new seq after the database commit, so subscribers never observe an
//! event for a row that does not exist.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use stagehand_core::error::CoreError;
use stagehand_core::types::DbId;
use stagehand_db::models::message::CreateMessage;
use stagehand_db::models::output_item::CreateOutputItem;
use stagehand_db::models::run::{CreateRun, FinishRun};
use stagehand_db::models::thread::{CreateThread, ReplyInput, UpdateThreadStatus};
use stagehand_db::repositories::{
    MessageRepo, OutputItemRepo, ResourceRepo, RunRepo, TenantRepo, ThreadRepo, UsageRepo,
};
use stagehand_events::{
    ThreadEvent, EVENT_MESSAGE_CREATED, EVENT_OUTPUT_ITEM_CREATED, EVENT_RUN_CREATED,
    EVENT_RUN_FINISHED, EVENT_THREAD_STATUS_CHANGED,
};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::query::{IncludeArchivedParams, PaginationParams};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for archive/unarchive.
#[derive(Debug, Deserialize)]
pub struct ArchiveRequest {
    #[serde(default = "default_archived")]
    pub archived: bool,
}

fn default_archived() -> bool {
    true
}

/// Query parameters for output item listing (`?since_seq=`).
#[derive(Debug, Deserialize)]
pub struct OutputItemsParams {
    pub since_seq: Option<i64>,
}

/// POST /api/v1/threads
///
/// Start a thread against a resource's current release. The run is
/// metered against the tenant's usage period first; if thread creation
/// then fails, the reserved count is released.
pub async fn create_thread(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateThread>,
) -> AppResult<impl IntoResponse> {
    let resource = ResourceRepo::find_by_id(&state.pool, auth.tenant_id, input.resource_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Resource",
            id: input.resource_id,
        }))?;

    let check = UsageRepo::check_and_increment(
        &state.pool,
        auth.tenant_id,
        &resource.kind,
        state.config.quota_mode,
    )
    .await?;

    if !check.allowed {
        let plan = TenantRepo::find_by_id(&state.pool, auth.tenant_id)
            .await?
            .map(|t| t.plan)
            .unwrap_or_default();
        return Err(AppError::Core(CoreError::ResourceLimit {
            kind: "run",
            limit: check.limit.unwrap_or(0),
            plan,
        }));
    }

    let thread = match ThreadRepo::create(&state.pool, auth.tenant_id, &input, Some(auth.user_id))
        .await
    {
        Ok(thread) => thread,
        Err(err) => {
            // Release the run we reserved for a thread that never started.
            if let Err(comp_err) =
                UsageRepo::decrement(&state.pool, auth.tenant_id, &resource.kind).await
            {
                tracing::warn!(
                    tenant_id = auth.tenant_id,
                    error = %comp_err,
                    "Failed to release reserved run after thread creation failure"
                );
            }
            return Err(err.into());
        }
    };

    tracing::info!(
        tenant_id = auth.tenant_id,
        thread_id = thread.id,
        resource_id = thread.resource_id,
        release_id = ?thread.release_id,
        overage = check.overage,
        "Thread started"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: thread })))
}

/// GET /api/v1/threads
pub async fn list_threads(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(archived): Query<IncludeArchivedParams>,
    Query(page): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    let threads = ThreadRepo::list(
        &state.pool,
        auth.tenant_id,
        archived.include_archived,
        page.limit,
        page.offset,
    )
    .await?;
    Ok(Json(DataResponse { data: threads }))
}

/// GET /api/v1/threads/{id}
pub async fn get_thread(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(thread_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let thread = ThreadRepo::find_by_id(&state.pool, auth.tenant_id, thread_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Thread",
            id: thread_id,
        }))?;
    Ok(Json(DataResponse { data: thread }))
}

/// PATCH /api/v1/threads/{id}/status
///
/// Transition a thread to a new status. Invalid moves per the transition
/// table come back as 400 with the offending pair named.
pub async fn update_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(thread_id): Path<DbId>,
    Json(input): Json<UpdateThreadStatus>,
) -> AppResult<impl IntoResponse> {
    let thread = ThreadRepo::update_status(&state.pool, auth.tenant_id, thread_id, &input).await?;

    state.event_bus.publish(
        ThreadEvent::new(EVENT_THREAD_STATUS_CHANGED, auth.tenant_id, thread_id, thread.seq)
            .with_actor(auth.user_id)
            .with_payload(serde_json::json!({ "status": thread.status })),
    );

    Ok(Json(DataResponse { data: thread }))
}

/// POST /api/v1/threads/{id}/reply
///
/// Free-text reply. Depending on the thread's state this either feeds a
/// pending input request (`signal`) or reactivates the thread
/// (`restart`); a pending approval rejects the reply.
pub async fn reply(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(thread_id): Path<DbId>,
    Json(input): Json<ReplyInput>,
) -> AppResult<impl IntoResponse> {
    let outcome =
        ThreadRepo::reply(&state.pool, auth.tenant_id, thread_id, &input, Some(auth.user_id))
            .await?;

    state.event_bus.publish(
        ThreadEvent::new(EVENT_MESSAGE_CREATED, auth.tenant_id, thread_id, outcome.seq)
            .with_actor(auth.user_id)
            .with_payload(serde_json::json!({
                "message_id": outcome.message_id,
                "action": outcome.action,
                "status": outcome.status,
            })),
    );

    Ok(Json(DataResponse { data: outcome }))
}

/// POST /api/v1/threads/{id}/archive
pub async fn set_archived(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(thread_id): Path<DbId>,
    Json(input): Json<ArchiveRequest>,
) -> AppResult<impl IntoResponse> {
    let thread = ThreadRepo::set_archived(&state.pool, auth.tenant_id, thread_id, input.archived)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Thread",
            id: thread_id,
        }))?;
    Ok(Json(DataResponse { data: thread }))
}

/// DELETE /api/v1/threads/{id}
pub async fn delete_thread(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(thread_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let deleted = ThreadRepo::delete(&state.pool, auth.tenant_id, thread_id).await?;
    if !deleted {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Thread",
            id: thread_id,
        }));
    }

    tracing::info!(tenant_id = auth.tenant_id, thread_id, "Thread deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Execution engine callbacks
// ---------------------------------------------------------------------------

/// POST /api/v1/threads/{id}/messages
pub async fn create_message(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(thread_id): Path<DbId>,
    Json(input): Json<CreateMessage>,
) -> AppResult<impl IntoResponse> {
    let message = MessageRepo::create_and_increment_seq(
        &state.pool,
        auth.tenant_id,
        thread_id,
        &input,
        Some(auth.user_id),
    )
    .await?;

    state.event_bus.publish(
        ThreadEvent::new(EVENT_MESSAGE_CREATED, auth.tenant_id, thread_id, message.seq)
            .with_actor(auth.user_id)
            .with_payload(serde_json::json!({ "message_id": message.id })),
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: message })))
}

/// GET /api/v1/threads/{id}/messages
pub async fn list_messages(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(thread_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    ensure_thread_exists(&state, auth.tenant_id, thread_id).await?;
    let messages = MessageRepo::list_for_thread(&state.pool, thread_id).await?;
    Ok(Json(DataResponse { data: messages }))
}

/// POST /api/v1/threads/{id}/runs
pub async fn create_run(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(thread_id): Path<DbId>,
    Json(input): Json<CreateRun>,
) -> AppResult<impl IntoResponse> {
    let run =
        RunRepo::create_and_increment_seq(&state.pool, auth.tenant_id, thread_id, &input).await?;

    state.event_bus.publish(
        ThreadEvent::new(EVENT_RUN_CREATED, auth.tenant_id, thread_id, run.seq)
            .with_payload(serde_json::json!({ "run_id": run.id })),
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: run })))
}

/// PATCH /api/v1/runs/{id}
///
/// Record a run's terminal outcome (completed/failed).
pub async fn finish_run(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
    Json(input): Json<FinishRun>,
) -> AppResult<impl IntoResponse> {
    let run =
        RunRepo::finish_and_increment_seq(&state.pool, auth.tenant_id, run_id, &input).await?;

    state.event_bus.publish(
        ThreadEvent::new(EVENT_RUN_FINISHED, auth.tenant_id, run.thread_id, run.seq)
            .with_payload(serde_json::json!({ "run_id": run.id, "status": run.status })),
    );

    Ok(Json(DataResponse { data: run }))
}

/// GET /api/v1/threads/{id}/runs
pub async fn list_runs(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(thread_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    ensure_thread_exists(&state, auth.tenant_id, thread_id).await?;
    let runs = RunRepo::list_for_thread(&state.pool, thread_id).await?;
    Ok(Json(DataResponse { data: runs }))
}

/// POST /api/v1/threads/{id}/output-items
pub async fn create_output_item(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(thread_id): Path<DbId>,
    Json(input): Json<CreateOutputItem>,
) -> AppResult<impl IntoResponse> {
    let item =
        OutputItemRepo::create_and_increment_seq(&state.pool, auth.tenant_id, thread_id, &input)
            .await?;

    state.event_bus.publish(
        ThreadEvent::new(EVENT_OUTPUT_ITEM_CREATED, auth.tenant_id, thread_id, item.seq)
            .with_payload(serde_json::json!({ "output_item_id": item.id })),
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: item })))
}

/// GET /api/v1/threads/{id}/output-items
///
/// Supports `?since_seq=` so pollers resume from where they left off.
pub async fn list_output_items(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(thread_id): Path<DbId>,
    Query(params): Query<OutputItemsParams>,
) -> AppResult<impl IntoResponse> {
    ensure_thread_exists(&state, auth.tenant_id, thread_id).await?;
    let items =
        OutputItemRepo::list_for_thread(&state.pool, thread_id, params.since_seq).await?;
    Ok(Json(DataResponse { data: items }))
}

/// Shared tenant-scope check for thread child listings.
pub(crate) async fn ensure_thread_exists(
    state: &AppState,
    tenant_id: DbId,
    thread_id: DbId,
) -> AppResult<()> {
    ThreadRepo::find_by_id(&state.pool, tenant_id, thread_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Thread",
            id: thread_id,
        }))?;
    Ok(())
}
