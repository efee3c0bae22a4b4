//! Stagehand event bus.
//!
//! This crate provides the in-process publish/subscribe hub the control
//! plane uses to fan out thread timeline changes:
//!
//! - [`EventBus`] — publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`ThreadEvent`] — the canonical event envelope, stamped with the
//!   thread's `seq` so consumers can detect gaps and resync.

pub mod bus;

pub use bus::{EventBus, ThreadEvent};

// Event type names, dot-separated `entity.verb`.
pub const EVENT_THREAD_STATUS_CHANGED: &str = "thread.status_changed";
pub const EVENT_MESSAGE_CREATED: &str = "message.created";
pub const EVENT_RUN_CREATED: &str = "run.created";
pub const EVENT_RUN_FINISHED: &str = "run.finished";
pub const EVENT_OUTPUT_ITEM_CREATED: &str = "output_item.created";
pub const EVENT_HUMAN_REQUEST_CREATED: &str = "human_request.created";
pub const EVENT_HUMAN_REQUEST_RESOLVED: &str = "human_request.resolved";
