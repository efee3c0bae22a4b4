//! Repository for the `recipe_steps` table.
//!
//! Step rows hang off either a working copy or a release, never both.
//! The copy helpers take an open transaction because they only ever run
//! as part of a deploy/checkout/save that must commit atomically.

use sqlx::{PgPool, Postgres, Transaction};
use stagehand_core::types::DbId;

use crate::models::recipe_step::{RecipeStep, StepInput};

/// Column list for recipe_steps queries.
const COLUMNS: &str = "id, release_id, working_copy_resource_id, step_key, \
    position, config, depends_on, created_at";

/// Provides operations on recipe step graphs.
pub struct RecipeStepRepo;

impl RecipeStepRepo {
    /// List a working copy's steps in execution order.
    pub async fn list_for_working_copy(
        pool: &PgPool,
        resource_id: DbId,
    ) -> Result<Vec<RecipeStep>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM recipe_steps
             WHERE working_copy_resource_id = $1
             ORDER BY position ASC"
        );
        sqlx::query_as::<_, RecipeStep>(&query)
            .bind(resource_id)
            .fetch_all(pool)
            .await
    }

    /// List a release's steps in execution order.
    pub async fn list_for_release(
        pool: &PgPool,
        release_id: DbId,
    ) -> Result<Vec<RecipeStep>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM recipe_steps
             WHERE release_id = $1
             ORDER BY position ASC"
        );
        sqlx::query_as::<_, RecipeStep>(&query)
            .bind(release_id)
            .fetch_all(pool)
            .await
    }

    /// Replace the working copy's step list with the given steps, keeping
    /// their order as positions.
    pub async fn replace_working_copy_steps(
        tx: &mut Transaction<'_, Postgres>,
        resource_id: DbId,
        steps: &[StepInput],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM recipe_steps WHERE working_copy_resource_id = $1")
            .bind(resource_id)
            .execute(&mut **tx)
            .await?;

        for (position, step) in steps.iter().enumerate() {
            sqlx::query(
                "INSERT INTO recipe_steps
                    (working_copy_resource_id, step_key, position, config, depends_on)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(resource_id)
            .bind(&step.step_key)
            .bind(position as i32)
            .bind(&step.config)
            .bind(&step.depends_on)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Snapshot the working copy's steps onto a freshly created release.
    pub async fn copy_working_copy_to_release(
        tx: &mut Transaction<'_, Postgres>,
        resource_id: DbId,
        release_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO recipe_steps (release_id, step_key, position, config, depends_on)
             SELECT $2, step_key, position, config, depends_on
             FROM recipe_steps
             WHERE working_copy_resource_id = $1
             ORDER BY position ASC",
        )
        .bind(resource_id)
        .bind(release_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Overwrite the working copy's steps with a release's snapshot
    /// (checkout).
    pub async fn copy_release_to_working_copy(
        tx: &mut Transaction<'_, Postgres>,
        release_id: DbId,
        resource_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM recipe_steps WHERE working_copy_resource_id = $1")
            .bind(resource_id)
            .execute(&mut **tx)
            .await?;

        sqlx::query(
            "INSERT INTO recipe_steps
                (working_copy_resource_id, step_key, position, config, depends_on)
             SELECT $2, step_key, position, config, depends_on
             FROM recipe_steps
             WHERE release_id = $1
             ORDER BY position ASC",
        )
        .bind(release_id)
        .bind(resource_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
