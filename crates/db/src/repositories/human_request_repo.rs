//! Repository for the `human_requests` and `human_responses` tables.
//!
//! Expiry is enforced lazily on read: a pending row whose `expires_at`
//! has passed is reported (and treated) as expired, with no background
//! reaper. Responding to an already-decided request is a no-op, not an
//! error, so retries from unreliable callers are safe.

use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use stagehand_core::error::CoreError;
use stagehand_core::human::{
    effective_status, expiry_at, terminal_status_for_response, RequestKind, RequestStatus,
};
use stagehand_core::types::DbId;

use crate::models::human_request::{
    CreateHumanRequest, CreateHumanResponse, HumanRequest, HumanResponse, RespondOutcome,
};
use crate::repositories::thread_repo::ThreadRepo;
use crate::DbResult;

/// Column list for human_requests queries.
const COLUMNS: &str = "id, thread_id, kind, authority, prompt, timeout_ms, \
    expires_at, fallback, status, seq, created_at, updated_at";

/// Column list for human_responses queries.
const RESPONSE_COLUMNS: &str = "id, request_id, responded_by, status, payload, created_at";

/// Provides operations on human-in-the-loop requests.
pub struct HumanRequestRepo;

impl HumanRequestRepo {
    /// Insert a request and bump the parent thread's seq as one
    /// transaction. `expires_at` is fixed at creation from `timeout_ms`.
    pub async fn create_and_increment_seq(
        pool: &PgPool,
        tenant_id: DbId,
        thread_id: DbId,
        input: &CreateHumanRequest,
    ) -> DbResult<HumanRequest> {
        let kind: RequestKind = input.kind.parse().map_err(|_| {
            CoreError::Validation(format!(
                "Invalid request kind '{}'. Must be one of: approval, input",
                input.kind
            ))
        })?;
        if let Some(ms) = input.timeout_ms {
            if ms <= 0 {
                return Err(
                    CoreError::Validation("timeout_ms must be positive".to_string()).into(),
                );
            }
        }

        let mut tx = pool.begin().await?;
        ThreadRepo::assert_owned(&mut *tx, tenant_id, thread_id).await?;
        let stamp = ThreadRepo::bump_seq(&mut *tx, thread_id).await?;
        let expires_at = expiry_at(Utc::now(), input.timeout_ms);

        let query = format!(
            "INSERT INTO human_requests
                (thread_id, kind, authority, prompt, timeout_ms, expires_at, fallback, seq)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        let request = sqlx::query_as::<_, HumanRequest>(&query)
            .bind(thread_id)
            .bind(kind.as_str())
            .bind(&input.authority)
            .bind(&input.prompt)
            .bind(input.timeout_ms)
            .bind(expires_at)
            .bind(&input.fallback)
            .bind(stamp.seq)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(request)
    }

    /// The newest request for a thread that is still genuinely pending,
    /// i.e. unanswered and not past its expiry.
    pub async fn pending_by_thread(
        pool: &PgPool,
        tenant_id: DbId,
        thread_id: DbId,
    ) -> DbResult<Option<HumanRequest>> {
        let query = format!(
            "SELECT {COLUMNS} FROM human_requests hr
             WHERE hr.thread_id = $1
               AND EXISTS (SELECT 1 FROM threads t WHERE t.id = $1 AND t.tenant_id = $2)
               AND hr.status = 'pending'
               AND (hr.expires_at IS NULL OR hr.expires_at > NOW())
             ORDER BY hr.created_at DESC
             LIMIT 1"
        );
        let request = sqlx::query_as::<_, HumanRequest>(&query)
            .bind(thread_id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await?;
        Ok(request)
    }

    /// Fetch a request by id, tenant-scoped through its thread. The
    /// returned status is the effective one (expiry applied).
    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: DbId,
        request_id: DbId,
    ) -> DbResult<HumanRequest> {
        let query = format!(
            "SELECT {COLUMNS} FROM human_requests hr
             WHERE hr.id = $1
               AND EXISTS (
                   SELECT 1 FROM threads t
                   WHERE t.id = hr.thread_id AND t.tenant_id = $2
               )"
        );
        let request = sqlx::query_as::<_, HumanRequest>(&query)
            .bind(request_id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "HumanRequest",
                id: request_id,
            })?;
        Ok(Self::with_effective_status(request))
    }

    /// List a thread's requests in seq order, with effective statuses.
    pub async fn list_for_thread(
        pool: &PgPool,
        thread_id: DbId,
    ) -> Result<Vec<HumanRequest>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM human_requests WHERE thread_id = $1 ORDER BY seq ASC");
        let requests = sqlx::query_as::<_, HumanRequest>(&query)
            .bind(thread_id)
            .fetch_all(pool)
            .await?;
        Ok(requests.into_iter().map(Self::with_effective_status).collect())
    }

    /// Record a response and close its request.
    ///
    /// The request row is locked for the duration so two concurrent
    /// answers serialize: the first one wins, the second observes
    /// `already_decided` and writes nothing.
    pub async fn create_response(
        pool: &PgPool,
        tenant_id: DbId,
        request_id: DbId,
        input: &CreateHumanResponse,
        ambient_user: Option<DbId>,
    ) -> DbResult<RespondOutcome> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "SELECT {COLUMNS} FROM human_requests hr
             WHERE hr.id = $1
               AND EXISTS (
                   SELECT 1 FROM threads t
                   WHERE t.id = hr.thread_id AND t.tenant_id = $2
               )
             FOR UPDATE"
        );
        let request = sqlx::query_as::<_, HumanRequest>(&query)
            .bind(request_id)
            .bind(tenant_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "HumanRequest",
                id: request_id,
            })?;

        let stored: RequestStatus = request.status.parse()?;
        let current = effective_status(stored, request.expires_at, Utc::now());
        if current.is_decided() {
            return Ok(RespondOutcome {
                request_id,
                thread_id: request.thread_id,
                request_status: current.as_str().to_string(),
                already_decided: true,
                response: None,
                seq: None,
            });
        }

        let terminal = terminal_status_for_response(input.status.as_deref());
        let responded_by = input.responded_by.or(ambient_user);

        // The response keeps the caller's declared status (approved,
        // rejected, ...); only the request collapses it to a terminal
        // lifecycle state.
        let insert = format!(
            "INSERT INTO human_responses (request_id, responded_by, status, payload)
             VALUES ($1, $2, COALESCE($3, 'responded'), $4)
             RETURNING {RESPONSE_COLUMNS}"
        );
        let response = sqlx::query_as::<_, HumanResponse>(&insert)
            .bind(request_id)
            .bind(responded_by)
            .bind(&input.status)
            .bind(&input.payload)
            .fetch_one(&mut *tx)
            .await?;

        let stamp = ThreadRepo::bump_seq(&mut *tx, request.thread_id).await?;
        Self::close_request(&mut *tx, request_id, terminal, stamp.seq).await?;

        tx.commit().await?;
        Ok(RespondOutcome {
            request_id,
            thread_id: request.thread_id,
            request_status: terminal.as_str().to_string(),
            already_decided: false,
            response: Some(response),
            seq: Some(stamp.seq),
        })
    }

    async fn close_request(
        conn: &mut PgConnection,
        request_id: DbId,
        terminal: RequestStatus,
        seq: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE human_requests
             SET status = $2, seq = $3, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(request_id)
        .bind(terminal.as_str())
        .bind(seq)
        .execute(conn)
        .await?;
        Ok(())
    }

    fn with_effective_status(mut request: HumanRequest) -> HumanRequest {
        if let Ok(stored) = request.status.parse::<RequestStatus>() {
            let effective = effective_status(stored, request.expires_at, Utc::now());
            request.status = effective.as_str().to_string();
        }
        request
    }
}
