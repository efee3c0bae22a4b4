//! Tenant (organization) row model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stagehand_core::types::{DbId, Timestamp};

/// A tenant row from the `tenants` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Tenant {
    pub id: DbId,
    pub slug: String,
    pub name: String,
    /// Plan tier name; parse via `stagehand_core::plans::PlanTier`.
    pub plan: String,
    /// Day of month the billing period starts on; `None` = calendar month.
    pub billing_anchor_day: Option<i16>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for creating a tenant.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTenant {
    pub slug: String,
    pub name: String,
    pub plan: Option<String>,
}
