//! Run models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stagehand_core::types::{DbId, Timestamp};

/// A run row from the `runs` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Run {
    pub id: DbId,
    pub thread_id: DbId,
    pub run_type: String,
    /// `"running"`, `"completed"`, or `"failed"`.
    pub status: String,
    pub input: Option<serde_json::Value>,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    pub seq: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for recording a new run on a thread.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRun {
    pub run_type: Option<String>,
    pub input: Option<serde_json::Value>,
}

/// Input for finishing a run.
#[derive(Debug, Clone, Deserialize)]
pub struct FinishRun {
    pub status: String,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
}
