//! Repository for the `runs` table.
//!
//! Run creation and completion both count as sequenced events on the
//! parent thread.

use sqlx::PgPool;
use stagehand_core::error::CoreError;
use stagehand_core::types::DbId;

use crate::models::run::{CreateRun, FinishRun, Run};
use crate::repositories::thread_repo::ThreadRepo;
use crate::DbResult;

/// Column list for runs queries.
const COLUMNS: &str = "id, thread_id, run_type, status, input, output, error, \
    seq, created_at, updated_at";

/// Run statuses a finish call may set.
const FINISH_STATUSES: &[&str] = &["completed", "failed"];

/// Provides operations on thread runs.
pub struct RunRepo;

impl RunRepo {
    /// Insert a run and bump the parent thread's seq as one transaction.
    pub async fn create_and_increment_seq(
        pool: &PgPool,
        tenant_id: DbId,
        thread_id: DbId,
        input: &CreateRun,
    ) -> DbResult<Run> {
        let mut tx = pool.begin().await?;
        ThreadRepo::assert_owned(&mut *tx, tenant_id, thread_id).await?;
        let stamp = ThreadRepo::bump_seq(&mut *tx, thread_id).await?;

        let query = format!(
            "INSERT INTO runs (thread_id, run_type, input, seq)
             VALUES ($1, COALESCE($2, 'agent'), $3, $4)
             RETURNING {COLUMNS}"
        );
        let run = sqlx::query_as::<_, Run>(&query)
            .bind(thread_id)
            .bind(&input.run_type)
            .bind(&input.input)
            .bind(stamp.seq)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(run)
    }

    /// Finish a run with its output or error, bumping the parent seq so
    /// subscribers observe the completion as an ordered event.
    pub async fn finish_and_increment_seq(
        pool: &PgPool,
        tenant_id: DbId,
        run_id: DbId,
        input: &FinishRun,
    ) -> DbResult<Run> {
        if !FINISH_STATUSES.contains(&input.status.as_str()) {
            return Err(CoreError::Validation(format!(
                "Invalid run status '{}'. Must be one of: {}",
                input.status,
                FINISH_STATUSES.join(", ")
            ))
            .into());
        }

        let mut tx = pool.begin().await?;

        let thread_id: Option<(DbId,)> = sqlx::query_as(
            "SELECT r.thread_id FROM runs r
             JOIN threads t ON t.id = r.thread_id
             WHERE r.id = $1 AND t.tenant_id = $2",
        )
        .bind(run_id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((thread_id,)) = thread_id else {
            return Err(CoreError::NotFound {
                entity: "Run",
                id: run_id,
            }
            .into());
        };

        let stamp = ThreadRepo::bump_seq(&mut *tx, thread_id).await?;

        let query = format!(
            "UPDATE runs SET
                status = $2,
                output = $3,
                error = $4,
                seq = $5,
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let run = sqlx::query_as::<_, Run>(&query)
            .bind(run_id)
            .bind(&input.status)
            .bind(&input.output)
            .bind(&input.error)
            .bind(stamp.seq)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(run)
    }

    /// List a thread's runs in seq order.
    pub async fn list_for_thread(
        pool: &PgPool,
        thread_id: DbId,
    ) -> Result<Vec<Run>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM runs WHERE thread_id = $1 ORDER BY seq ASC");
        sqlx::query_as::<_, Run>(&query)
            .bind(thread_id)
            .fetch_all(pool)
            .await
    }
}
