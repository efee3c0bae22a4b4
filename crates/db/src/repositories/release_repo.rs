//! Repository for the `releases` table. Releases are append-only and
//! created only by `ResourceRepo::deploy`; this repo is read-side.

use sqlx::PgPool;
use stagehand_core::types::DbId;

use crate::models::resource::Release;

/// Column list for releases queries.
pub(crate) const RELEASE_COLUMNS: &str = "id, resource_id, major, minor, patch, \
    description, config, config_hash, created_by, created_at";

/// Maximum page size for release listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for release listing.
const DEFAULT_LIMIT: i64 = 50;

/// Provides read operations for releases.
pub struct ReleaseRepo;

impl ReleaseRepo {
    /// Find a release by its primary key.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Release>, sqlx::Error> {
        let query = format!("SELECT {RELEASE_COLUMNS} FROM releases WHERE id = $1");
        sqlx::query_as::<_, Release>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a release, verifying it belongs to the given resource.
    pub async fn find_for_resource(
        pool: &PgPool,
        resource_id: DbId,
        release_id: DbId,
    ) -> Result<Option<Release>, sqlx::Error> {
        let query = format!(
            "SELECT {RELEASE_COLUMNS} FROM releases WHERE id = $1 AND resource_id = $2"
        );
        sqlx::query_as::<_, Release>(&query)
            .bind(release_id)
            .bind(resource_id)
            .fetch_optional(pool)
            .await
    }

    /// List releases for a resource, newest version first.
    pub async fn list_for_resource(
        pool: &PgPool,
        resource_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Release>, sqlx::Error> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = offset.unwrap_or(0);
        let query = format!(
            "SELECT {RELEASE_COLUMNS} FROM releases
             WHERE resource_id = $1
             ORDER BY major DESC, minor DESC, patch DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Release>(&query)
            .bind(resource_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// The newest published release, if any exists.
    pub async fn latest_for_resource(
        pool: &PgPool,
        resource_id: DbId,
    ) -> Result<Option<Release>, sqlx::Error> {
        let query = format!(
            "SELECT {RELEASE_COLUMNS} FROM releases
             WHERE resource_id = $1
             ORDER BY major DESC, minor DESC, patch DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, Release>(&query)
            .bind(resource_id)
            .fetch_optional(pool)
            .await
    }
}
