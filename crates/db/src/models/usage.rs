//! Usage period models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stagehand_core::types::{DbId, Timestamp};

/// A usage period row from the `usage_periods` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UsagePeriod {
    pub id: DbId,
    pub tenant_id: DbId,
    pub period_start: chrono::NaiveDate,
    pub run_count: i64,
    /// `None` = unlimited.
    pub run_limit: Option<i64>,
    pub overage_count: i64,
    pub run_type_counts: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Result of `check_and_increment`.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaCheck {
    pub allowed: bool,
    /// Run count after this call (unchanged when rejected).
    pub current: i64,
    pub limit: Option<i64>,
    /// Set when the run was counted beyond the limit for metered billing.
    pub overage: bool,
}
