//! Caller identity for one logical operation.
//!
//! Every operation runs under an explicit, request-scoped [`Identity`]
//! binding -- never a global. The API layer constructs one per request
//! from the bearer token; system processes construct one directly,
//! optionally acting on behalf of a user (e.g. replaying a recorded
//! human response). Accessors for a required identity kind fail loudly
//! instead of silently defaulting.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

/// Who is performing the current operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Principal {
    /// A human caller authenticated via the API.
    User { user_id: DbId },
    /// An internal process (execution engine, scheduler), optionally
    /// acting on a user's behalf.
    System { acting_as: Option<DbId> },
}

/// The immutable identity binding for one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub tenant_id: DbId,
    pub principal: Principal,
}

impl Identity {
    /// Identity for an authenticated human caller.
    pub fn user(tenant_id: DbId, user_id: DbId) -> Self {
        Self {
            tenant_id,
            principal: Principal::User { user_id },
        }
    }

    /// Identity for an internal process.
    pub fn system(tenant_id: DbId) -> Self {
        Self {
            tenant_id,
            principal: Principal::System { acting_as: None },
        }
    }

    /// A system identity acting on behalf of a specific user. The
    /// returned binding is a new value; the caller's own binding is
    /// untouched, so nested operations restore the outer identity by
    /// simply dropping this one.
    pub fn acting_as(&self, user_id: DbId) -> Self {
        Self {
            tenant_id: self.tenant_id,
            principal: Principal::System {
                acting_as: Some(user_id),
            },
        }
    }

    /// The user id to attribute writes to, when any is available:
    /// the authenticated user, or the user a system call acts for.
    pub fn attributed_user(&self) -> Option<DbId> {
        match self.principal {
            Principal::User { user_id } => Some(user_id),
            Principal::System { acting_as } => acting_as,
        }
    }

    /// Require a human caller; system identities are rejected.
    pub fn require_user(&self) -> Result<DbId, CoreError> {
        match self.principal {
            Principal::User { user_id } => Ok(user_id),
            Principal::System { .. } => Err(CoreError::Forbidden(
                "This operation requires a user identity".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_identity_requires_user() {
        let id = Identity::user(1, 42);
        assert_eq!(id.require_user().unwrap(), 42);
        assert_eq!(id.attributed_user(), Some(42));
    }

    #[test]
    fn bare_system_identity_has_no_user() {
        let id = Identity::system(1);
        assert!(id.require_user().is_err());
        assert_eq!(id.attributed_user(), None);
    }

    #[test]
    fn acting_as_attributes_without_becoming_a_user() {
        let system = Identity::system(1);
        let delegated = system.acting_as(7);
        assert_eq!(delegated.attributed_user(), Some(7));
        // Still a system principal -- user-only operations stay closed.
        assert!(delegated.require_user().is_err());
        // The outer binding is untouched.
        assert_eq!(system.attributed_user(), None);
    }
}
