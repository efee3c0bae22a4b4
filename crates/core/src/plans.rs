//! Plan tiers and their quota limits.
//!
//! The billing provider owns money; this module only answers "what does
//! plan X allow". Limits of `None` mean unlimited.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Subscription plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Free,
    Starter,
    Pro,
    Enterprise,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "starter" => Ok(Self::Starter),
            "pro" => Ok(Self::Pro),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(CoreError::Internal(format!("Unknown plan tier '{other}'"))),
        }
    }
}

/// What a plan allows. `None` = unlimited.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PlanLimits {
    /// Runs per usage period.
    pub monthly_runs: Option<i64>,
    /// Resources of each kind (agents, recipes, prompts counted separately).
    pub resources_per_kind: Option<i64>,
    /// Whether over-limit runs are billed as overage instead of blocked
    /// (soft enforcement mode only).
    pub overage_allowed: bool,
}

/// Look up the limits for a plan tier.
pub fn limits_for(tier: PlanTier) -> PlanLimits {
    match tier {
        PlanTier::Free => PlanLimits {
            monthly_runs: Some(100),
            resources_per_kind: Some(3),
            overage_allowed: false,
        },
        PlanTier::Starter => PlanLimits {
            monthly_runs: Some(2_000),
            resources_per_kind: Some(20),
            overage_allowed: true,
        },
        PlanTier::Pro => PlanLimits {
            monthly_runs: Some(20_000),
            resources_per_kind: Some(100),
            overage_allowed: true,
        },
        PlanTier::Enterprise => PlanLimits {
            monthly_runs: None,
            resources_per_kind: None,
            overage_allowed: true,
        },
    }
}

/// Quota enforcement mode for run metering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementMode {
    /// Always reject at/over limit.
    Hard,
    /// Reject only free-tier tenants; paid plans degrade to metered
    /// overage instead of failure.
    Soft,
}

/// Outcome of a quota check for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaAction {
    /// Under limit: count the run.
    Allow,
    /// At/over limit and enforcement blocks it.
    Reject,
    /// At/over limit but the plan meters it as billable overage.
    Overage,
}

/// Decide what to do with one more run given the locked period state.
///
/// `current` is the run count already recorded for the period; `limit`
/// is the period's run limit (`None` = unlimited).
pub fn quota_action(
    mode: EnforcementMode,
    tier: PlanTier,
    current: i64,
    limit: Option<i64>,
) -> QuotaAction {
    let Some(limit) = limit else {
        return QuotaAction::Allow;
    };
    if current < limit {
        return QuotaAction::Allow;
    }
    match mode {
        EnforcementMode::Hard => QuotaAction::Reject,
        EnforcementMode::Soft => {
            if limits_for(tier).overage_allowed {
                QuotaAction::Overage
            } else {
                QuotaAction::Reject
            }
        }
    }
}
