//! Versioned resource models: resource identity, working copy, release.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stagehand_core::types::{DbId, Timestamp};
use stagehand_core::version::Bump;

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A resource row from the `resources` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Resource {
    pub id: DbId,
    pub tenant_id: DbId,
    /// `"agent"`, `"recipe"`, or `"prompt"`.
    pub kind: String,
    pub slug: String,
    pub name: String,
    pub current_release_id: Option<DbId>,
    pub archived: bool,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// The single editable, unpublished config for a resource.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WorkingCopy {
    pub resource_id: DbId,
    pub config: serde_json::Value,
    pub config_hash: String,
    pub updated_by: Option<DbId>,
    pub updated_at: Timestamp,
}

/// An immutable published snapshot from the `releases` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Release {
    pub id: DbId,
    pub resource_id: DbId,
    pub major: i32,
    pub minor: i32,
    pub patch: i32,
    pub description: Option<String>,
    pub config: serde_json::Value,
    pub config_hash: String,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
}

impl Release {
    /// The release's version rendered as `major.minor.patch`.
    pub fn version(&self) -> String {
        stagehand_core::version::format_version((self.major, self.minor, self.patch))
    }
}

// ---------------------------------------------------------------------------
// Create / request DTOs
// ---------------------------------------------------------------------------

/// Input for creating a new resource.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateResource {
    pub kind: String,
    pub slug: String,
    pub name: String,
}

/// Input for `deploy`: exactly one of `version` / `bump` must be set.
#[derive(Debug, Clone, Deserialize)]
pub struct DeployRequest {
    pub version: Option<String>,
    pub bump: Option<Bump>,
    pub description: Option<String>,
}

/// Input for `adopt` / `checkout`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseRef {
    pub release_id: DbId,
}
