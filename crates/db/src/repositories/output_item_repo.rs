//! Repository for the `output_items` table.

use sqlx::PgPool;
use stagehand_core::types::DbId;

use crate::models::output_item::{CreateOutputItem, OutputItem};
use crate::repositories::thread_repo::ThreadRepo;
use crate::DbResult;

/// Column list for output_items queries.
const COLUMNS: &str = "id, thread_id, run_id, item_type, content, seq, created_at";

/// Provides operations on thread output items.
pub struct OutputItemRepo;

impl OutputItemRepo {
    /// Insert an output item and bump the parent thread's seq as one
    /// transaction.
    pub async fn create_and_increment_seq(
        pool: &PgPool,
        tenant_id: DbId,
        thread_id: DbId,
        input: &CreateOutputItem,
    ) -> DbResult<OutputItem> {
        let mut tx = pool.begin().await?;
        ThreadRepo::assert_owned(&mut *tx, tenant_id, thread_id).await?;
        let stamp = ThreadRepo::bump_seq(&mut *tx, thread_id).await?;

        let query = format!(
            "INSERT INTO output_items (thread_id, run_id, item_type, content, seq)
             VALUES ($1, $2, COALESCE($3, 'text'), $4, $5)
             RETURNING {COLUMNS}"
        );
        let item = sqlx::query_as::<_, OutputItem>(&query)
            .bind(thread_id)
            .bind(input.run_id)
            .bind(&input.item_type)
            .bind(&input.content)
            .bind(stamp.seq)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(item)
    }

    /// List a thread's output items in seq order, optionally since a
    /// known seq so pollers can resume from where they left off.
    pub async fn list_for_thread(
        pool: &PgPool,
        thread_id: DbId,
        since_seq: Option<i64>,
    ) -> Result<Vec<OutputItem>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM output_items
             WHERE thread_id = $1 AND ($2::bigint IS NULL OR seq > $2)
             ORDER BY seq ASC"
        );
        sqlx::query_as::<_, OutputItem>(&query)
            .bind(thread_id)
            .bind(since_seq)
            .fetch_all(pool)
            .await
    }
}
