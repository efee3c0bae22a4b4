//! Thread models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stagehand_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A thread row from the `threads` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Thread {
    pub id: DbId,
    pub tenant_id: DbId,
    pub resource_id: DbId,
    pub release_id: Option<DbId>,
    pub channel: String,
    pub environment: String,
    /// Parse via `stagehand_core::thread_status::ThreadStatus`.
    pub status: String,
    /// Per-thread monotonic event counter.
    pub seq: i64,
    pub payload: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub archived: bool,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Create / request DTOs
// ---------------------------------------------------------------------------

/// Input for starting a thread against a resource's current release.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateThread {
    pub resource_id: DbId,
    pub channel: Option<String>,
    pub environment: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Input for a status update.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateThreadStatus {
    pub status: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Input for a free-text reply to a thread.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyInput {
    pub content: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Response DTOs
// ---------------------------------------------------------------------------

/// The `(seq, updated_at)` pair returned by every sequenced mutation so
/// realtime consumers can detect gaps.
#[derive(Debug, Clone, Copy, FromRow, Serialize)]
pub struct SeqStamp {
    pub seq: i64,
    pub updated_at: Timestamp,
}

/// What a reply did, per the three-way branch on thread state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyAction {
    /// Delivered to the in-flight execution as a resume signal; the
    /// thread status is unchanged.
    Signal,
    /// The thread was reactivated and a fresh execution should be
    /// dispatched.
    Restart,
}

/// Result of replying to a thread.
#[derive(Debug, Clone, Serialize)]
pub struct ReplyOutcome {
    pub action: ReplyAction,
    pub message_id: DbId,
    pub seq: i64,
    pub status: String,
}
