//! Output item models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stagehand_core::types::{DbId, Timestamp};

/// An output item row from the `output_items` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OutputItem {
    pub id: DbId,
    pub thread_id: DbId,
    pub run_id: Option<DbId>,
    pub item_type: String,
    pub content: serde_json::Value,
    pub seq: i64,
    pub created_at: Timestamp,
}

/// Input for recording an output item.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOutputItem {
    pub run_id: Option<DbId>,
    pub item_type: Option<String>,
    pub content: serde_json::Value,
}
