//! Event system for state-layer diagnostics
//!
//! This module provides an in-process event bus that announces what the
//! state layer did: pages loaded or failed, lists reset, profile changes.
//! It is for logging, metrics and debugging overlays. Rendering layers
//! observe state through [`SingleValueCache::subscribe`](crate::SingleValueCache::subscribe)
//! and [`PaginationController::subscribe`](crate::PaginationController::subscribe), not here.
//!
//! # Non-Blocking Behavior
//!
//! The bus uses `tokio::sync::broadcast`. If no subscribers exist, events are
//! dropped immediately. Subscribers can lag without blocking emitters; a
//! lagging subscriber loses the oldest events.
//!
//! # Example
//!
//! ```no_run
//! use libfeedstate::service::events::{EventBus, StateEvent};
//!
//! # async fn example() {
//! let event_bus = EventBus::new(100);
//! let mut receiver = event_bus.subscribe();
//!
//! event_bus.emit(StateEvent::ProfileChanged {
//!     user_id: "u1".to_string(),
//!     version: 1,
//! });
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {:?}", event);
//! }
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::ErrorInfo;

/// Event receiver type alias
pub type EventReceiver = broadcast::Receiver<StateEvent>;

/// Event bus for distributing state events
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StateEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified capacity
    ///
    /// The capacity determines how many events can be buffered per subscriber
    /// before older events are dropped.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events emitted after this call
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: StateEvent) {
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Events emitted by the state layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateEvent {
    /// A page was merged into a list
    PageLoaded {
        /// Controller instance
        list_id: Uuid,
        /// Human-readable list name (e.g. "home-feed")
        list: String,
        /// Generation the page belonged to
        generation: u64,
        /// Items in this page
        received: usize,
        /// Items accumulated so far
        total: usize,
        /// Whether this page ended the list
        exhausted: bool,
    },

    /// A page fetch failed; the list stays retryable
    PageFailed {
        list_id: Uuid,
        list: String,
        generation: u64,
        error: ErrorInfo,
    },

    /// A list was cleared for a new query or filter
    ListReset {
        list_id: Uuid,
        list: String,
        /// The new generation
        generation: u64,
    },

    /// The cached profile was replaced or edited
    ProfileChanged {
        /// Id of the profile now in the cache (empty after sign-out)
        user_id: String,
        /// Cache version after the change
        version: u64,
    },
}
