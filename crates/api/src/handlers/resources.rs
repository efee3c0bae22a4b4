//! Handlers for the versioned resource lifecycle.
//!
//! A resource's editable state lives in its single working copy; publish
//! points (`deploy`), pointer moves (`adopt`), and restores (`checkout`)
//! all go through [`ResourceRepo`].

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use stagehand_core::error::CoreError;
use stagehand_core::types::DbId;
use stagehand_db::models::recipe_step::StepInput;
use stagehand_db::models::resource::{CreateResource, DeployRequest, ReleaseRef};
use stagehand_db::repositories::{RecipeStepRepo, ReleaseRepo, ResourceRepo};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for resource listing (`?kind=recipe`).
#[derive(Debug, Deserialize)]
pub struct ListResourcesParams {
    pub kind: Option<String>,
}

/// Request body for saving a working copy.
#[derive(Debug, Deserialize)]
pub struct SaveWorkingCopyRequest {
    pub config: serde_json::Value,
    /// Recipes only; replaces the whole step list.
    pub steps: Option<Vec<StepInput>>,
}

/// POST /api/v1/resources
///
/// Create a resource and its empty working copy. The tenant's plan limit
/// on resources per kind is enforced under a tenant row lock.
pub async fn create_resource(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateResource>,
) -> AppResult<impl IntoResponse> {
    let resource =
        ResourceRepo::create(&state.pool, auth.tenant_id, &input, Some(auth.user_id)).await?;

    tracing::info!(
        tenant_id = auth.tenant_id,
        resource_id = resource.id,
        kind = %resource.kind,
        slug = %resource.slug,
        "Resource created"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: resource })))
}

/// GET /api/v1/resources
pub async fn list_resources(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<ListResourcesParams>,
) -> AppResult<impl IntoResponse> {
    let resources =
        ResourceRepo::list(&state.pool, auth.tenant_id, params.kind.as_deref()).await?;
    Ok(Json(DataResponse { data: resources }))
}

/// GET /api/v1/resources/{id}
pub async fn get_resource(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(resource_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let resource = ResourceRepo::find_by_id(&state.pool, auth.tenant_id, resource_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Resource",
            id: resource_id,
        }))?;
    Ok(Json(DataResponse { data: resource }))
}

/// PUT /api/v1/resources/{id}/working-copy
///
/// Overwrite the working copy's config (and, for recipes, its steps).
/// Bindings are not validated here; in-progress edits may be transiently
/// invalid and only `deploy` gates on them.
pub async fn save_working_copy(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(resource_id): Path<DbId>,
    Json(input): Json<SaveWorkingCopyRequest>,
) -> AppResult<impl IntoResponse> {
    let working_copy = ResourceRepo::save_working_copy(
        &state.pool,
        auth.tenant_id,
        resource_id,
        &input.config,
        input.steps.as_deref(),
        Some(auth.user_id),
    )
    .await?;
    Ok(Json(DataResponse { data: working_copy }))
}

/// POST /api/v1/resources/{id}/deploy
///
/// Publish the working copy as a new immutable release and move the
/// current-release pointer to it.
pub async fn deploy(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(resource_id): Path<DbId>,
    Json(input): Json<DeployRequest>,
) -> AppResult<impl IntoResponse> {
    let release = ResourceRepo::deploy(
        &state.pool,
        auth.tenant_id,
        resource_id,
        &input,
        Some(auth.user_id),
    )
    .await?;

    tracing::info!(
        tenant_id = auth.tenant_id,
        resource_id,
        release_id = release.id,
        version = %release.version(),
        "Release deployed"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: release })))
}

/// POST /api/v1/resources/{id}/adopt
///
/// Repoint the current release at an existing one, without publishing.
pub async fn adopt(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(resource_id): Path<DbId>,
    Json(input): Json<ReleaseRef>,
) -> AppResult<impl IntoResponse> {
    let resource =
        ResourceRepo::adopt(&state.pool, auth.tenant_id, resource_id, input.release_id).await?;

    tracing::info!(
        tenant_id = auth.tenant_id,
        resource_id,
        release_id = input.release_id,
        "Release adopted"
    );

    Ok(Json(DataResponse { data: resource }))
}

/// POST /api/v1/resources/{id}/checkout
///
/// Restore a past release's snapshot into the working copy, discarding
/// unpublished edits.
pub async fn checkout(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(resource_id): Path<DbId>,
    Json(input): Json<ReleaseRef>,
) -> AppResult<impl IntoResponse> {
    let working_copy = ResourceRepo::checkout(
        &state.pool,
        auth.tenant_id,
        resource_id,
        input.release_id,
        Some(auth.user_id),
    )
    .await?;
    Ok(Json(DataResponse { data: working_copy }))
}

/// GET /api/v1/resources/{id}/releases
pub async fn list_releases(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(resource_id): Path<DbId>,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    // Verify tenant ownership before touching the releases table.
    ResourceRepo::find_by_id(&state.pool, auth.tenant_id, resource_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Resource",
            id: resource_id,
        }))?;

    let releases =
        ReleaseRepo::list_for_resource(&state.pool, resource_id, params.limit, params.offset)
            .await?;
    Ok(Json(DataResponse { data: releases }))
}

/// GET /api/v1/resources/{id}/steps
///
/// The working copy's step graph (recipes only; empty for other kinds).
pub async fn list_working_copy_steps(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(resource_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    ResourceRepo::find_by_id(&state.pool, auth.tenant_id, resource_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Resource",
            id: resource_id,
        }))?;

    let steps = RecipeStepRepo::list_for_working_copy(&state.pool, resource_id).await?;
    Ok(Json(DataResponse { data: steps }))
}
