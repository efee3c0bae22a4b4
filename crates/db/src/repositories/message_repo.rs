//! Repository for the `messages` table.

use sqlx::PgPool;
use stagehand_core::types::DbId;

use crate::models::message::{CreateMessage, Message};
use crate::repositories::thread_repo::ThreadRepo;
use crate::DbResult;

/// Column list for messages queries.
const COLUMNS: &str = "id, thread_id, role, content, seq, created_by, created_at";

/// Provides operations on thread messages.
pub struct MessageRepo;

impl MessageRepo {
    /// Insert a message and bump the parent thread's seq as one
    /// transaction. The message carries the seq it was assigned.
    pub async fn create_and_increment_seq(
        pool: &PgPool,
        tenant_id: DbId,
        thread_id: DbId,
        input: &CreateMessage,
        created_by: Option<DbId>,
    ) -> DbResult<Message> {
        let mut tx = pool.begin().await?;
        ThreadRepo::assert_owned(&mut *tx, tenant_id, thread_id).await?;
        let stamp = ThreadRepo::bump_seq(&mut *tx, thread_id).await?;

        let query = format!(
            "INSERT INTO messages (thread_id, role, content, seq, created_by)
             VALUES ($1, COALESCE($2, 'user'), $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        let message = sqlx::query_as::<_, Message>(&query)
            .bind(thread_id)
            .bind(&input.role)
            .bind(&input.content)
            .bind(stamp.seq)
            .bind(created_by)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(message)
    }

    /// List a thread's messages in seq order.
    pub async fn list_for_thread(
        pool: &PgPool,
        thread_id: DbId,
    ) -> Result<Vec<Message>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM messages WHERE thread_id = $1 ORDER BY seq ASC"
        );
        sqlx::query_as::<_, Message>(&query)
            .bind(thread_id)
            .fetch_all(pool)
            .await
    }
}
