//! Thread status lifecycle and transition rules.
//!
//! A thread moves through a fixed transition table. Same-state writes are
//! always allowed (idempotent no-op); everything else must appear in the
//! table. Validation always runs against the freshly read status inside
//! the transaction that performs the write, never a cached value -- that
//! part is the repository's job, this module only answers "is from -> to
//! legal".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Execution status of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    Running,
    WaitingHuman,
    Completed,
    Failed,
    Cancelled,
    Rejected,
    Skipped,
}

impl ThreadStatus {
    /// String representation for display, logging, and database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::WaitingHuman => "waiting_human",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Rejected => "rejected",
            Self::Skipped => "skipped",
        }
    }

    /// Statuses a thread may move to from `self` (excluding same-state).
    pub fn allowed_targets(&self) -> &'static [ThreadStatus] {
        use ThreadStatus::*;
        match self {
            Running => &[WaitingHuman, Completed, Failed, Cancelled, Rejected, Skipped],
            WaitingHuman => &[Running, Completed, Failed, Cancelled, Rejected],
            Completed => &[Running],
            Failed => &[Running],
            Rejected => &[Running],
            Cancelled => &[],
            Skipped => &[],
        }
    }

    /// Whether this status has no exits at all.
    pub fn is_terminal(&self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// Statuses from which `reactivate` (a conditional move back to
    /// `running`) is permitted.
    pub const REACTIVATABLE: [ThreadStatus; 4] = [
        ThreadStatus::WaitingHuman,
        ThreadStatus::Completed,
        ThreadStatus::Rejected,
        ThreadStatus::Failed,
    ];
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreadStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "waiting_human" => Ok(Self::WaitingHuman),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "rejected" => Ok(Self::Rejected),
            "skipped" => Ok(Self::Skipped),
            other => Err(CoreError::Internal(format!(
                "Unknown thread status '{other}'"
            ))),
        }
    }
}

/// Validate a status transition.
///
/// Same-state transitions always pass. Illegal moves produce a validation
/// error naming both states.
pub fn validate_transition(from: ThreadStatus, to: ThreadStatus) -> Result<(), CoreError> {
    if from == to || from.allowed_targets().contains(&to) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid status transition from {from} to {to}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use ThreadStatus::*;

    const ALL: [ThreadStatus; 7] = [
        Running,
        WaitingHuman,
        Completed,
        Failed,
        Cancelled,
        Rejected,
        Skipped,
    ];

    #[test]
    fn same_state_always_permitted() {
        for status in ALL {
            assert!(validate_transition(status, status).is_ok(), "{status}");
        }
    }

    #[test]
    fn running_can_reach_every_other_state() {
        for target in [WaitingHuman, Completed, Failed, Cancelled, Rejected, Skipped] {
            assert!(validate_transition(Running, target).is_ok(), "{target}");
        }
    }

    #[test]
    fn waiting_human_cannot_skip() {
        assert!(validate_transition(WaitingHuman, Running).is_ok());
        assert!(validate_transition(WaitingHuman, Skipped).is_err());
    }

    #[test]
    fn retry_paths_lead_back_to_running() {
        assert!(validate_transition(Completed, Running).is_ok());
        assert!(validate_transition(Failed, Running).is_ok());
        assert!(validate_transition(Rejected, Running).is_ok());
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for terminal in [Cancelled, Skipped] {
            assert!(terminal.is_terminal());
            for target in ALL {
                if target != terminal {
                    assert!(validate_transition(terminal, target).is_err());
                }
            }
        }
    }

    #[test]
    fn cancelled_to_running_names_both_states() {
        let err = validate_transition(Cancelled, Running).unwrap_err();
        assert_matches!(
            err,
            CoreError::Validation(msg)
                if msg == "Invalid status transition from cancelled to running"
        );
    }

    #[test]
    fn completed_cannot_fail_directly() {
        assert!(validate_transition(Completed, Failed).is_err());
        assert!(validate_transition(Completed, WaitingHuman).is_err());
    }

    #[test]
    fn reactivatable_set_matches_table() {
        for status in ThreadStatus::REACTIVATABLE {
            assert!(validate_transition(status, Running).is_ok(), "{status}");
        }
        assert!(!ThreadStatus::REACTIVATABLE.contains(&Cancelled));
        assert!(!ThreadStatus::REACTIVATABLE.contains(&Skipped));
    }

    #[test]
    fn as_str_round_trips() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<ThreadStatus>().unwrap(), status);
        }
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&WaitingHuman).unwrap();
        assert_eq!(json, "\"waiting_human\"");
    }
}
