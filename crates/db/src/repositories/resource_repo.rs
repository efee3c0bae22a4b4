//! Repository for the `resources`, `working_copies`, and `releases`
//! tables: the versioned-resource lifecycle.
//!
//! `deploy`, `adopt`, and `checkout` are the only ways a resource's
//! `current_release_id` moves. All multi-table writes here commit
//! atomically or not at all.

use sqlx::PgPool;
use stagehand_core::error::CoreError;
use stagehand_core::hashing::config_hash;
use stagehand_core::plans::{limits_for, PlanTier};
use stagehand_core::slugs::validate_slug;
use stagehand_core::step_bindings::validate_step_bindings;
use stagehand_core::types::DbId;
use stagehand_core::version::resolve_target;

use crate::models::recipe_step::StepInput;
use crate::models::resource::{
    CreateResource, DeployRequest, Release, Resource, WorkingCopy,
};
use crate::repositories::recipe_step_repo::RecipeStepRepo;
use crate::repositories::release_repo::{ReleaseRepo, RELEASE_COLUMNS};
use crate::repositories::tenant_repo::TenantRepo;
use crate::{DbError, DbResult};

/// Column list for resources queries.
const COLUMNS: &str = "id, tenant_id, kind, slug, name, current_release_id, \
    archived, created_by, created_at, updated_at";

/// Column list for working_copies queries.
const WC_COLUMNS: &str = "resource_id, config, config_hash, updated_by, updated_at";

/// Recognised resource kinds.
const KINDS: &[&str] = &["agent", "recipe", "prompt"];

/// Resource kind for recipes, which carry a step graph.
pub const KIND_RECIPE: &str = "recipe";

/// Provides lifecycle operations for versioned resources.
pub struct ResourceRepo;

impl ResourceRepo {
    /// Create a resource and its (empty) working copy.
    ///
    /// The tenant row is locked before the plan's resource-count limit is
    /// re-checked, so two concurrent creates cannot both pass a stale
    /// count. Exceeding the limit is a domain error, not a failure.
    pub async fn create(
        pool: &PgPool,
        tenant_id: DbId,
        input: &CreateResource,
        created_by: Option<DbId>,
    ) -> DbResult<Resource> {
        validate_slug(&input.slug)?;
        let kind = kind_label(&input.kind)?;

        let mut tx = pool.begin().await?;

        let tenant = TenantRepo::lock_for_update(&mut *tx, tenant_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Tenant",
                id: tenant_id,
            })?;
        let tier: PlanTier = tenant.plan.parse()?;

        if let Some(limit) = limits_for(tier).resources_per_kind {
            let (count,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM resources
                 WHERE tenant_id = $1 AND kind = $2 AND archived = FALSE",
            )
            .bind(tenant_id)
            .bind(&input.kind)
            .fetch_one(&mut *tx)
            .await?;

            if count >= limit {
                return Err(CoreError::ResourceLimit {
                    kind,
                    limit,
                    plan: tenant.plan,
                }
                .into());
            }
        }

        let query = format!(
            "INSERT INTO resources (tenant_id, kind, slug, name, created_by)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        let resource = sqlx::query_as::<_, Resource>(&query)
            .bind(tenant_id)
            .bind(&input.kind)
            .bind(&input.slug)
            .bind(&input.name)
            .bind(created_by)
            .fetch_one(&mut *tx)
            .await?;

        // Every resource has exactly one working copy from birth.
        let empty = serde_json::json!({});
        sqlx::query(
            "INSERT INTO working_copies (resource_id, config, config_hash, updated_by)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(resource.id)
        .bind(&empty)
        .bind(config_hash(&empty))
        .bind(created_by)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(resource)
    }

    /// Find a resource by id, scoped to the tenant.
    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
    ) -> Result<Option<Resource>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM resources WHERE id = $1 AND tenant_id = $2");
        sqlx::query_as::<_, Resource>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// List a tenant's resources, optionally filtered by kind.
    pub async fn list(
        pool: &PgPool,
        tenant_id: DbId,
        kind: Option<&str>,
    ) -> Result<Vec<Resource>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM resources
             WHERE tenant_id = $1 AND ($2::text IS NULL OR kind = $2)
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Resource>(&query)
            .bind(tenant_id)
            .bind(kind)
            .fetch_all(pool)
            .await
    }

    /// Fetch a resource's working copy.
    pub async fn working_copy(
        pool: &PgPool,
        tenant_id: DbId,
        resource_id: DbId,
    ) -> Result<Option<WorkingCopy>, sqlx::Error> {
        let query = format!(
            "SELECT {WC_COLUMNS} FROM working_copies wc
             WHERE wc.resource_id = $1
               AND EXISTS (SELECT 1 FROM resources r
                           WHERE r.id = $1 AND r.tenant_id = $2)"
        );
        sqlx::query_as::<_, WorkingCopy>(&query)
            .bind(resource_id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// Upsert the working copy with a new config (and, for recipes, a new
    /// step list).
    ///
    /// Saving an identical config is a no-op in effect (the hash does not
    /// change) but still touches `updated_at`/`updated_by`. Step bindings
    /// are NOT validated here; in-progress edits may be transiently
    /// invalid.
    pub async fn save_working_copy(
        pool: &PgPool,
        tenant_id: DbId,
        resource_id: DbId,
        config: &serde_json::Value,
        steps: Option<&[StepInput]>,
        updated_by: Option<DbId>,
    ) -> DbResult<WorkingCopy> {
        let resource = Self::find_by_id(pool, tenant_id, resource_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Resource",
                id: resource_id,
            })?;

        let hash = config_hash(config);
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO working_copies (resource_id, config, config_hash, updated_by)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (resource_id) DO UPDATE SET
                config = EXCLUDED.config,
                config_hash = EXCLUDED.config_hash,
                updated_by = EXCLUDED.updated_by,
                updated_at = NOW()
             RETURNING {WC_COLUMNS}"
        );
        let working_copy = sqlx::query_as::<_, WorkingCopy>(&query)
            .bind(resource_id)
            .bind(config)
            .bind(&hash)
            .bind(updated_by)
            .fetch_one(&mut *tx)
            .await?;

        if let Some(steps) = steps {
            if resource.kind != KIND_RECIPE {
                return Err(CoreError::Validation(format!(
                    "Resource kind '{}' has no step graph",
                    resource.kind
                ))
                .into());
            }
            RecipeStepRepo::replace_working_copy_steps(&mut tx, resource_id, steps).await?;
        }

        tx.commit().await?;
        Ok(working_copy)
    }

    /// Publish the working copy as a new immutable release and move
    /// `current_release_id` to it.
    ///
    /// Exactly one of `version`/`bump` must be given. For recipes, the
    /// step binding order check runs first and reports every violation.
    /// Release insert, pointer reassignment, step copy, and the working
    /// copy audit touch commit as one transaction.
    pub async fn deploy(
        pool: &PgPool,
        tenant_id: DbId,
        resource_id: DbId,
        req: &DeployRequest,
        user_id: Option<DbId>,
    ) -> DbResult<Release> {
        let resource = Self::find_by_id(pool, tenant_id, resource_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Resource",
                id: resource_id,
            })?;

        let working_copy = Self::working_copy(pool, tenant_id, resource_id)
            .await?
            .ok_or_else(|| {
                CoreError::Validation("Resource has no working copy to deploy".into())
            })?;

        let wc_steps = if resource.kind == KIND_RECIPE {
            let steps = RecipeStepRepo::list_for_working_copy(pool, resource_id).await?;
            let defs: Vec<_> = steps.iter().map(|s| s.to_def()).collect();
            let validation = validate_step_bindings(&defs);
            if !validation.valid {
                let detail: Vec<String> =
                    validation.errors.iter().map(|e| e.message.clone()).collect();
                return Err(CoreError::Validation(format!(
                    "Step bindings are invalid: {}",
                    detail.join("; ")
                ))
                .into());
            }
            Some(steps)
        } else {
            None
        };

        let latest = ReleaseRepo::latest_for_resource(pool, resource_id).await?;

        // Re-publishing an identical working copy would mint a duplicate
        // release. The hash covers the config blob only; recipe steps are
        // compared separately.
        if let Some(latest) = &latest {
            if latest.config_hash == working_copy.config_hash {
                let steps_unchanged = match &wc_steps {
                    Some(steps) => {
                        let published =
                            RecipeStepRepo::list_for_release(pool, latest.id).await?;
                        steps.len() == published.len()
                            && steps.iter().zip(&published).all(|(a, b)| {
                                a.step_key == b.step_key
                                    && a.config == b.config
                                    && a.depends_on == b.depends_on
                            })
                    }
                    None => true,
                };
                if steps_unchanged {
                    return Err(CoreError::Conflict(format!(
                        "Working copy is unchanged since version {}",
                        latest.version()
                    ))
                    .into());
                }
            }
        }

        let (major, minor, patch) = resolve_target(
            latest.as_ref().map(|r| (r.major, r.minor, r.patch)),
            req.version.as_deref(),
            req.bump,
        )?;

        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO releases
                (resource_id, major, minor, patch, description, config, config_hash, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {RELEASE_COLUMNS}"
        );
        let release = sqlx::query_as::<_, Release>(&query)
            .bind(resource_id)
            .bind(major)
            .bind(minor)
            .bind(patch)
            .bind(&req.description)
            .bind(&working_copy.config)
            .bind(&working_copy.config_hash)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        if resource.kind == KIND_RECIPE {
            RecipeStepRepo::copy_working_copy_to_release(&mut tx, resource_id, release.id)
                .await?;
        }

        sqlx::query(
            "UPDATE resources SET current_release_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(resource_id)
        .bind(release.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE working_copies SET updated_by = $2, updated_at = NOW()
             WHERE resource_id = $1",
        )
        .bind(resource_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            resource_id,
            release_id = release.id,
            version = %release.version(),
            "Deployed release",
        );
        Ok(release)
    }

    /// Repoint `current_release_id` at an existing release. No new
    /// release is created.
    pub async fn adopt(
        pool: &PgPool,
        tenant_id: DbId,
        resource_id: DbId,
        release_id: DbId,
    ) -> DbResult<Resource> {
        let query = format!(
            "UPDATE resources SET current_release_id = $3, updated_at = NOW()
             WHERE id = $1 AND tenant_id = $2
               AND EXISTS (SELECT 1 FROM releases
                           WHERE id = $3 AND resource_id = $1)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Resource>(&query)
            .bind(resource_id)
            .bind(tenant_id)
            .bind(release_id)
            .fetch_optional(pool)
            .await?
            .ok_or(
                CoreError::NotFound {
                    entity: "Release",
                    id: release_id,
                }
                .into(),
            )
    }

    /// Copy a past release's config (and steps) back into the working
    /// copy, discarding unpublished edits. The release's hash is reused.
    pub async fn checkout(
        pool: &PgPool,
        tenant_id: DbId,
        resource_id: DbId,
        release_id: DbId,
        user_id: Option<DbId>,
    ) -> DbResult<WorkingCopy> {
        let resource = Self::find_by_id(pool, tenant_id, resource_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Resource",
                id: resource_id,
            })?;

        let release = ReleaseRepo::find_for_resource(pool, resource_id, release_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Release",
                id: release_id,
            })?;

        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE working_copies SET
                config = $2,
                config_hash = $3,
                updated_by = $4,
                updated_at = NOW()
             WHERE resource_id = $1
             RETURNING {WC_COLUMNS}"
        );
        let working_copy = sqlx::query_as::<_, WorkingCopy>(&query)
            .bind(resource_id)
            .bind(&release.config)
            .bind(&release.config_hash)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        if resource.kind == KIND_RECIPE {
            RecipeStepRepo::copy_release_to_working_copy(&mut tx, release_id, resource_id)
                .await?;
        }

        tx.commit().await?;
        Ok(working_copy)
    }

    /// Archive or unarchive a resource (soft state, independent of
    /// releases).
    pub async fn set_archived(
        pool: &PgPool,
        tenant_id: DbId,
        resource_id: DbId,
        archived: bool,
    ) -> Result<Option<Resource>, sqlx::Error> {
        let query = format!(
            "UPDATE resources SET archived = $3, updated_at = NOW()
             WHERE id = $1 AND tenant_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Resource>(&query)
            .bind(resource_id)
            .bind(tenant_id)
            .bind(archived)
            .fetch_optional(pool)
            .await
    }
}

/// Map a kind string to its static label, rejecting unknown kinds.
fn kind_label(kind: &str) -> Result<&'static str, DbError> {
    match kind {
        "agent" => Ok("agent"),
        "recipe" => Ok("recipe"),
        "prompt" => Ok("prompt"),
        other => Err(CoreError::Validation(format!(
            "Unknown resource kind '{other}'. Must be one of: {}",
            KINDS.join(", ")
        ))
        .into()),
    }
}
