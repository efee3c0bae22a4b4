//! Human-in-the-loop request/response vocabulary.
//!
//! A human request suspends a thread until someone (or something acting
//! on someone's behalf) answers it. Expiry is declarative: `expires_at`
//! is computed once at creation and enforced by whoever reads pending
//! requests. Nothing polls.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

/// What kind of answer a request is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// A yes/no gate. Free-text replies to the thread are rejected while
    /// one of these is pending; it must be resolved via a response.
    Approval,
    /// Free-form input. A thread reply while one of these is pending is
    /// delivered to the in-flight execution as a resume signal.
    Input,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approval => "approval",
            Self::Input => "input",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approval" => Ok(Self::Approval),
            "input" => Ok(Self::Input),
            other => Err(CoreError::Internal(format!(
                "Unknown human request kind '{other}'"
            ))),
        }
    }
}

/// Stored lifecycle status of a human request.
///
/// `Expired` is never written to the database -- it is computed on read
/// from `expires_at` via [`effective_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Responded,
    Cancelled,
    Skipped,
    Expired,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Responded => "responded",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
            Self::Expired => "expired",
        }
    }

    /// Whether a decision has been recorded (any state but pending).
    pub fn is_decided(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "responded" => Ok(Self::Responded),
            "cancelled" => Ok(Self::Cancelled),
            "skipped" => Ok(Self::Skipped),
            "expired" => Ok(Self::Expired),
            other => Err(CoreError::Internal(format!(
                "Unknown human request status '{other}'"
            ))),
        }
    }
}

/// Map a response's declared status onto the request's terminal status.
///
/// A response of `cancelled` or `skipped` closes the request in kind;
/// anything else (including `None`) means it was answered.
pub fn terminal_status_for_response(response_status: Option<&str>) -> RequestStatus {
    match response_status {
        Some("cancelled") => RequestStatus::Cancelled,
        Some("skipped") => RequestStatus::Skipped,
        _ => RequestStatus::Responded,
    }
}

/// Compute the expiry instant for a request created at `created_at`.
pub fn expiry_at(created_at: Timestamp, timeout_ms: Option<i64>) -> Option<Timestamp> {
    timeout_ms.map(|ms| created_at + Duration::milliseconds(ms))
}

/// The status a reader should report: a pending request whose expiry has
/// passed is `expired`, everything else is the stored status.
pub fn effective_status(
    stored: RequestStatus,
    expires_at: Option<Timestamp>,
    now: Timestamp,
) -> RequestStatus {
    match (stored, expires_at) {
        (RequestStatus::Pending, Some(expiry)) if expiry <= now => RequestStatus::Expired,
        _ => stored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn response_status_maps_to_terminal_state() {
        assert_eq!(
            terminal_status_for_response(Some("cancelled")),
            RequestStatus::Cancelled
        );
        assert_eq!(
            terminal_status_for_response(Some("skipped")),
            RequestStatus::Skipped
        );
        assert_eq!(
            terminal_status_for_response(Some("answered")),
            RequestStatus::Responded
        );
        assert_eq!(terminal_status_for_response(None), RequestStatus::Responded);
    }

    #[test]
    fn expiry_is_computed_from_timeout() {
        let created = Utc::now();
        let expiry = expiry_at(created, Some(30_000)).unwrap();
        assert_eq!(expiry - created, Duration::milliseconds(30_000));
        assert!(expiry_at(created, None).is_none());
    }

    #[test]
    fn pending_past_expiry_reads_as_expired() {
        let now = Utc::now();
        let past = now - Duration::seconds(1);
        assert_eq!(
            effective_status(RequestStatus::Pending, Some(past), now),
            RequestStatus::Expired
        );
    }

    #[test]
    fn pending_before_expiry_stays_pending() {
        let now = Utc::now();
        let future = now + Duration::seconds(60);
        assert_eq!(
            effective_status(RequestStatus::Pending, Some(future), now),
            RequestStatus::Pending
        );
        assert_eq!(
            effective_status(RequestStatus::Pending, None, now),
            RequestStatus::Pending
        );
    }

    #[test]
    fn decided_requests_never_expire() {
        let now = Utc::now();
        let past = now - Duration::seconds(1);
        assert_eq!(
            effective_status(RequestStatus::Responded, Some(past), now),
            RequestStatus::Responded
        );
        assert_eq!(
            effective_status(RequestStatus::Cancelled, Some(past), now),
            RequestStatus::Cancelled
        );
    }

    #[test]
    fn is_decided_covers_all_non_pending() {
        assert!(!RequestStatus::Pending.is_decided());
        assert!(RequestStatus::Responded.is_decided());
        assert!(RequestStatus::Cancelled.is_decided());
        assert!(RequestStatus::Skipped.is_decided());
        assert!(RequestStatus::Expired.is_decided());
    }

    #[test]
    fn kind_round_trips() {
        assert_eq!("approval".parse::<RequestKind>().unwrap(), RequestKind::Approval);
        assert_eq!("input".parse::<RequestKind>().unwrap(), RequestKind::Input);
        assert!("poke".parse::<RequestKind>().is_err());
    }
}
