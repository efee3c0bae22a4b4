//! Repository for the `tenants` table.

use sqlx::{PgConnection, PgPool};
use stagehand_core::types::DbId;

use crate::models::tenant::{CreateTenant, Tenant};

/// Column list for tenants queries.
const COLUMNS: &str = "id, slug, name, plan, billing_anchor_day, created_at, updated_at";

/// Provides CRUD operations for tenants.
pub struct TenantRepo;

impl TenantRepo {
    /// Insert a new tenant, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateTenant) -> Result<Tenant, sqlx::Error> {
        let query = format!(
            "INSERT INTO tenants (slug, name, plan)
             VALUES ($1, $2, COALESCE($3, 'free'))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Tenant>(&query)
            .bind(&input.slug)
            .bind(&input.name)
            .bind(&input.plan)
            .fetch_one(pool)
            .await
    }

    /// Find a tenant by its primary key.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Tenant>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tenants WHERE id = $1");
        sqlx::query_as::<_, Tenant>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Read the tenant row with a row-level lock, serializing any
    /// tenant-scoped count check against concurrent creators. Must be
    /// called inside an open transaction.
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<Tenant>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tenants WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Tenant>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Update a tenant's plan tier, returning the updated row.
    pub async fn set_plan(
        pool: &PgPool,
        id: DbId,
        plan: &str,
    ) -> Result<Option<Tenant>, sqlx::Error> {
        let query = format!(
            "UPDATE tenants SET plan = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Tenant>(&query)
            .bind(id)
            .bind(plan)
            .fetch_optional(pool)
            .await
    }
}
