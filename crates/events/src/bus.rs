//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`ThreadEvent`]s. It is
//! designed to be shared via `Arc<EventBus>` across the application.
//!
//! Delivery is best-effort: a slow subscriber observes
//! `RecvError::Lagged` and is expected to resync from the database using
//! the `seq` stamps on what it did receive. The database write is the
//! source of truth, never the bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stagehand_core::types::DbId;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// ThreadEvent
// ---------------------------------------------------------------------------

/// A change on a thread's timeline.
///
/// Constructed via [`ThreadEvent::new`] and enriched with the builder
/// methods [`with_actor`](ThreadEvent::with_actor) and
/// [`with_payload`](ThreadEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadEvent {
    /// Dot-separated event name, e.g. `"thread.status_changed"`.
    pub event_type: String,

    /// Tenant that owns the thread.
    pub tenant_id: DbId,

    /// Thread the event belongs to.
    pub thread_id: DbId,

    /// The thread's seq after the mutation that produced this event.
    /// Strictly increasing per thread; consumers detect gaps with it.
    pub seq: i64,

    /// Optional id of the user that triggered the event.
    pub actor_user_id: Option<DbId>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl ThreadEvent {
    /// Create a new event with the required envelope fields.
    pub fn new(event_type: impl Into<String>, tenant_id: DbId, thread_id: DbId, seq: i64) -> Self {
        Self {
            event_type: event_type.into(),
            tenant_id,
            thread_id,
            seq,
            actor_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Attach the acting user to the event.
    pub fn with_actor(mut self, user_id: DbId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`ThreadEvent`].
pub struct EventBus {
    sender: broadcast::Sender<ThreadEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are
    /// dropped and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// the database row it describes already exists.
    pub fn publish(&self, event: ThreadEvent) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<ThreadEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
