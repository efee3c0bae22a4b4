//! Repository for the `threads` table: status lifecycle and the per-thread
//! sequence counter.
//!
//! Transition validation always runs against the status read under a row
//! lock in the same transaction that writes the new one, never a cached
//! value. Every sequenced mutation returns the new `(seq, updated_at)`
//! pair so realtime consumers can detect gaps.

use sqlx::{PgConnection, PgPool};
use stagehand_core::error::CoreError;
use stagehand_core::human::RequestKind;
use stagehand_core::thread_status::{validate_transition, ThreadStatus};
use stagehand_core::types::DbId;

use crate::models::thread::{
    CreateThread, ReplyAction, ReplyInput, ReplyOutcome, SeqStamp, Thread,
    UpdateThreadStatus,
};
use crate::DbResult;

/// Column list for threads queries.
const COLUMNS: &str = "id, tenant_id, resource_id, release_id, channel, environment, \
    status, seq, payload, result, error, archived, created_by, created_at, updated_at";

/// Maximum page size for thread listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for thread listing.
const DEFAULT_LIMIT: i64 = 50;

/// Provides lifecycle operations for threads.
pub struct ThreadRepo;

impl ThreadRepo {
    /// Start a new thread against a resource's current release.
    ///
    /// The resource must have a deployed release; the thread pins it at
    /// creation. The caller is responsible for metering the run (quota
    /// check) before dispatching execution.
    pub async fn create(
        pool: &PgPool,
        tenant_id: DbId,
        input: &CreateThread,
        created_by: Option<DbId>,
    ) -> DbResult<Thread> {
        let release_id: Option<(Option<DbId>,)> = sqlx::query_as(
            "SELECT current_release_id FROM resources WHERE id = $1 AND tenant_id = $2",
        )
        .bind(input.resource_id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await?;

        let Some((release_id,)) = release_id else {
            return Err(CoreError::NotFound {
                entity: "Resource",
                id: input.resource_id,
            }
            .into());
        };
        let Some(release_id) = release_id else {
            return Err(CoreError::Validation(format!(
                "Resource {} has no deployed release to run against",
                input.resource_id
            ))
            .into());
        };

        let query = format!(
            "INSERT INTO threads
                (tenant_id, resource_id, release_id, channel, environment, payload, created_by)
             VALUES ($1, $2, $3, COALESCE($4, 'api'), COALESCE($5, 'production'), $6, $7)
             RETURNING {COLUMNS}"
        );
        let thread = sqlx::query_as::<_, Thread>(&query)
            .bind(tenant_id)
            .bind(input.resource_id)
            .bind(release_id)
            .bind(&input.channel)
            .bind(&input.environment)
            .bind(&input.payload)
            .bind(created_by)
            .fetch_one(pool)
            .await?;
        Ok(thread)
    }

    /// Find a thread by id, scoped to the tenant.
    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
    ) -> Result<Option<Thread>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM threads WHERE id = $1 AND tenant_id = $2");
        sqlx::query_as::<_, Thread>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// List a tenant's threads, newest first. Archived threads are
    /// excluded unless requested.
    pub async fn list(
        pool: &PgPool,
        tenant_id: DbId,
        include_archived: bool,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Thread>, sqlx::Error> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = offset.unwrap_or(0);
        let query = format!(
            "SELECT {COLUMNS} FROM threads
             WHERE tenant_id = $1 AND (archived = FALSE OR $2)
             ORDER BY created_at DESC
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, Thread>(&query)
            .bind(tenant_id)
            .bind(include_archived)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Increment the thread's sequence counter, returning the new value.
    ///
    /// Must run in the same transaction as the child insert it sequences;
    /// the row update doubles as the lock that serializes concurrent
    /// writers on the thread.
    pub(crate) async fn bump_seq(
        conn: &mut PgConnection,
        thread_id: DbId,
    ) -> Result<SeqStamp, sqlx::Error> {
        sqlx::query_as::<_, SeqStamp>(
            "UPDATE threads SET seq = seq + 1, updated_at = NOW()
             WHERE id = $1
             RETURNING seq, updated_at",
        )
        .bind(thread_id)
        .fetch_one(conn)
        .await
    }

    /// Assert a thread exists and belongs to the tenant, inside an open
    /// transaction.
    pub(crate) async fn assert_owned(
        conn: &mut PgConnection,
        tenant_id: DbId,
        thread_id: DbId,
    ) -> DbResult<()> {
        let found: Option<(DbId,)> =
            sqlx::query_as("SELECT id FROM threads WHERE id = $1 AND tenant_id = $2")
                .bind(thread_id)
                .bind(tenant_id)
                .fetch_optional(conn)
                .await?;
        if found.is_none() {
            return Err(CoreError::NotFound {
                entity: "Thread",
                id: thread_id,
            }
            .into());
        }
        Ok(())
    }

    /// Transition a thread to a new status.
    ///
    /// Reads the current status under a row lock, validates the move
    /// against the transition table, then writes status (and optional
    /// result/error) plus a seq bump -- all in one transaction.
    pub async fn update_status(
        pool: &PgPool,
        tenant_id: DbId,
        thread_id: DbId,
        input: &UpdateThreadStatus,
    ) -> DbResult<Thread> {
        let to: ThreadStatus = input.status.parse().map_err(|_| {
            CoreError::Validation(format!("Unknown thread status '{}'", input.status))
        })?;

        let mut tx = pool.begin().await?;

        let current: Option<(String,)> = sqlx::query_as(
            "SELECT status FROM threads WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        )
        .bind(thread_id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((current,)) = current else {
            return Err(CoreError::NotFound {
                entity: "Thread",
                id: thread_id,
            }
            .into());
        };
        let from: ThreadStatus = current.parse()?;
        validate_transition(from, to)?;

        let query = format!(
            "UPDATE threads SET
                status = $2,
                result = COALESCE($3, result),
                error = COALESCE($4, error),
                seq = seq + 1,
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let thread = sqlx::query_as::<_, Thread>(&query)
            .bind(thread_id)
            .bind(to.as_str())
            .bind(&input.result)
            .bind(&input.error)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(thread)
    }

    /// Conditionally move a thread back to `running`.
    ///
    /// Succeeds only when the thread is currently in a reactivatable
    /// status. Zero rows updated means the status changed concurrently;
    /// the caller gets a conflict and must not retry blindly.
    pub async fn reactivate(
        pool: &PgPool,
        tenant_id: DbId,
        thread_id: DbId,
    ) -> DbResult<Thread> {
        let allowed: Vec<&str> = ThreadStatus::REACTIVATABLE
            .iter()
            .map(|s| s.as_str())
            .collect();
        let query = format!(
            "UPDATE threads SET status = 'running', seq = seq + 1, updated_at = NOW()
             WHERE id = $1 AND tenant_id = $2 AND status = ANY($3)
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Thread>(&query)
            .bind(thread_id)
            .bind(tenant_id)
            .bind(&allowed)
            .fetch_optional(pool)
            .await?;

        updated.ok_or_else(|| {
            CoreError::Conflict(format!(
                "Thread {thread_id} could not be reactivated; its status changed concurrently"
            ))
            .into()
        })
    }

    /// Reply to a thread with free text.
    ///
    /// Behaviour depends on the thread's current state, read under a row
    /// lock:
    /// 1. waiting on a pending *approval* -> rejected; approvals resolve
    ///    via the human-response path, not free text.
    /// 2. waiting on a pending non-approval request -> the message is
    ///    recorded and delivered as a resume signal; no reactivation,
    ///    the execution engine still owns the thread.
    /// 3. otherwise -> the message is recorded and the thread is
    ///    reactivated for a fresh dispatch.
    pub async fn reply(
        pool: &PgPool,
        tenant_id: DbId,
        thread_id: DbId,
        input: &ReplyInput,
        created_by: Option<DbId>,
    ) -> DbResult<ReplyOutcome> {
        let mut tx = pool.begin().await?;

        let thread: Option<(String,)> = sqlx::query_as(
            "SELECT status FROM threads WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        )
        .bind(thread_id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((status,)) = thread else {
            return Err(CoreError::NotFound {
                entity: "Thread",
                id: thread_id,
            }
            .into());
        };
        let status: ThreadStatus = status.parse()?;

        if status == ThreadStatus::WaitingHuman {
            let pending: Option<(DbId, String)> = sqlx::query_as(
                "SELECT id, kind FROM human_requests
                 WHERE thread_id = $1 AND status = 'pending'
                   AND (expires_at IS NULL OR expires_at > NOW())
                 ORDER BY created_at DESC
                 LIMIT 1",
            )
            .bind(thread_id)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some((request_id, kind)) = pending {
                let kind: RequestKind = kind.parse()?;
                if kind == RequestKind::Approval {
                    return Err(CoreError::Validation(format!(
                        "Thread {thread_id} is waiting on approval request {request_id}; \
                         resolve it with a response instead of replying"
                    ))
                    .into());
                }

                // Resume signal: the execution is still in flight, it
                // just needs this answer. Status stays waiting_human.
                let stamp = Self::bump_seq(&mut *tx, thread_id).await?;
                let (message_id,): (DbId,) = sqlx::query_as(
                    "INSERT INTO messages (thread_id, role, content, seq, created_by)
                     VALUES ($1, 'user', $2, $3, $4)
                     RETURNING id",
                )
                .bind(thread_id)
                .bind(&input.content)
                .bind(stamp.seq)
                .bind(created_by)
                .fetch_one(&mut *tx)
                .await?;
                tx.commit().await?;

                return Ok(ReplyOutcome {
                    action: ReplyAction::Signal,
                    message_id,
                    seq: stamp.seq,
                    status: ThreadStatus::WaitingHuman.as_str().to_string(),
                });
            }
        }

        // No live request to feed: record the message, then restart the
        // thread. Terminal states surface the transition error.
        validate_transition(status, ThreadStatus::Running)?;

        let stamp = Self::bump_seq(&mut *tx, thread_id).await?;
        let (message_id,): (DbId,) = sqlx::query_as(
            "INSERT INTO messages (thread_id, role, content, seq, created_by)
             VALUES ($1, 'user', $2, $3, $4)
             RETURNING id",
        )
        .bind(thread_id)
        .bind(&input.content)
        .bind(stamp.seq)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        let reactivated = sqlx::query_as::<_, SeqStamp>(
            "UPDATE threads SET status = 'running', seq = seq + 1, updated_at = NOW()
             WHERE id = $1
             RETURNING seq, updated_at",
        )
        .bind(thread_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ReplyOutcome {
            action: ReplyAction::Restart,
            message_id,
            seq: reactivated.seq,
            status: ThreadStatus::Running.as_str().to_string(),
        })
    }

    /// Archive or unarchive a thread (independent of status).
    pub async fn set_archived(
        pool: &PgPool,
        tenant_id: DbId,
        thread_id: DbId,
        archived: bool,
    ) -> Result<Option<Thread>, sqlx::Error> {
        let query = format!(
            "UPDATE threads SET archived = $3, updated_at = NOW()
             WHERE id = $1 AND tenant_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Thread>(&query)
            .bind(thread_id)
            .bind(tenant_id)
            .bind(archived)
            .fetch_optional(pool)
            .await
    }

    /// Hard-delete a thread and its children. Tenant-scoped; returns
    /// whether a row was removed.
    pub async fn delete(
        pool: &PgPool,
        tenant_id: DbId,
        thread_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM threads WHERE id = $1 AND tenant_id = $2")
            .bind(thread_id)
            .bind(tenant_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
