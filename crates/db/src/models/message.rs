//! Message models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stagehand_core::types::{DbId, Timestamp};

/// A message row from the `messages` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Message {
    pub id: DbId,
    pub thread_id: DbId,
    pub role: String,
    pub content: serde_json::Value,
    pub seq: i64,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
}

/// Input for appending a message to a thread.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMessage {
    pub role: Option<String>,
    pub content: serde_json::Value,
}
