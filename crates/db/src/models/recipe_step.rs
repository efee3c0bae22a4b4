//! Recipe step graph rows.
//!
//! A step row is parented by exactly one of `release_id` /
//! `working_copy_resource_id` (enforced by a check constraint).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stagehand_core::step_bindings::StepDef;
use stagehand_core::types::{DbId, Timestamp};

/// A step row from the `recipe_steps` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RecipeStep {
    pub id: DbId,
    pub release_id: Option<DbId>,
    pub working_copy_resource_id: Option<DbId>,
    pub step_key: String,
    pub position: i32,
    pub config: serde_json::Value,
    pub depends_on: Vec<String>,
    pub created_at: Timestamp,
}

impl RecipeStep {
    /// View of this row as a validation input.
    pub fn to_def(&self) -> StepDef {
        StepDef {
            step_key: self.step_key.clone(),
            config: self.config.clone(),
            depends_on: self.depends_on.clone(),
        }
    }
}

/// Input for replacing a working copy's step list.
#[derive(Debug, Clone, Deserialize)]
pub struct StepInput {
    pub step_key: String,
    pub config: serde_json::Value,
    #[serde(default)]
    pub depends_on: Vec<String>,
}
