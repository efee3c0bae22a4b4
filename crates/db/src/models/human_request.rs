//! Human request/response models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stagehand_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A human request row from the `human_requests` table.
///
/// `status` holds the stored lifecycle state; whether a pending request
/// has expired is computed on read (see
/// `stagehand_core::human::effective_status`).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct HumanRequest {
    pub id: DbId,
    pub thread_id: DbId,
    /// `"approval"` or `"input"`.
    pub kind: String,
    pub authority: Option<String>,
    pub prompt: serde_json::Value,
    pub timeout_ms: Option<i64>,
    pub expires_at: Option<Timestamp>,
    pub fallback: Option<String>,
    pub status: String,
    pub seq: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A human response row, 1:1 with its request.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct HumanResponse {
    pub id: DbId,
    pub request_id: DbId,
    pub responded_by: Option<DbId>,
    pub status: String,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Create DTOs
// ---------------------------------------------------------------------------

/// Input for raising a human request on a thread.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateHumanRequest {
    pub kind: String,
    pub authority: Option<String>,
    #[serde(default)]
    pub prompt: serde_json::Value,
    pub timeout_ms: Option<i64>,
    pub fallback: Option<String>,
}

/// Input for answering a request.
///
/// `responded_by` is optional: when absent, the ambient caller identity
/// is attributed, which lets an interactive human and a system replay
/// share one code path.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateHumanResponse {
    pub status: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub responded_by: Option<DbId>,
}

// ---------------------------------------------------------------------------
// Response DTOs
// ---------------------------------------------------------------------------

/// Result of answering a request.
///
/// `already_decided` is set when the request had been resolved before
/// this call; that case is a safe no-op, not an error, so idempotent
/// retries from unreliable callers succeed.
#[derive(Debug, Clone, Serialize)]
pub struct RespondOutcome {
    pub request_id: DbId,
    pub thread_id: DbId,
    pub request_status: String,
    pub already_decided: bool,
    pub response: Option<HumanResponse>,
    /// New thread seq; absent when nothing was written.
    pub seq: Option<i64>,
}
