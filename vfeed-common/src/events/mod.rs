//! Event types for the vfeed event system
//!
//! Provides the shared `FeedEvent` definitions and the `EventBus` used by the
//! playback coordinator and the active-index resolver to notify observers.

use crate::ids::UnitId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events observable from outside the playback subsystem
///
/// Serialized with an internal `type` tag so a host UI layer can forward them
/// verbatim (e.g. to a JS bridge or a debug overlay).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FeedEvent {
    /// The single active unit changed
    ///
    /// `unit_id` is `None` when no unit is active any more (unregister of the
    /// active unit, deactivate-all, cleanup).
    ActiveChanged {
        unit_id: Option<UnitId>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A unit finished activating and is now playing
    PlayerLoaded {
        unit_id: UnitId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A unit finished its deactivation sequence
    ///
    /// Emitted even when the unit's deactivate capability rejected; the
    /// coordinator no longer considers it playing either way.
    PlayerUnloaded {
        unit_id: UnitId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The resolver settled on a new active feed index
    IndexActivated {
        index: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl FeedEvent {
    pub fn active_changed(unit_id: Option<UnitId>) -> Self {
        FeedEvent::ActiveChanged {
            unit_id,
            timestamp: crate::time::now(),
        }
    }

    pub fn player_loaded(unit_id: UnitId) -> Self {
        FeedEvent::PlayerLoaded {
            unit_id,
            timestamp: crate::time::now(),
        }
    }

    pub fn player_unloaded(unit_id: UnitId) -> Self {
        FeedEvent::PlayerUnloaded {
            unit_id,
            timestamp: crate::time::now(),
        }
    }

    pub fn index_activated(index: usize) -> Self {
        FeedEvent::IndexActivated {
            index,
            timestamp: crate::time::now(),
        }
    }

    /// Short event name, used in log lines
    pub fn event_type(&self) -> &'static str {
        match self {
            FeedEvent::ActiveChanged { .. } => "ActiveChanged",
            FeedEvent::PlayerLoaded { .. } => "PlayerLoaded",
            FeedEvent::PlayerUnloaded { .. } => "PlayerUnloaded",
            FeedEvent::IndexActivated { .. } => "IndexActivated",
        }
    }
}

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block the coordinator)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
///
/// One bus is created per feed screen and injected into the coordinator and
/// resolver, so tests can subscribe to a private instance.
///
/// # Examples
///
/// ```
/// use vfeed_common::events::{EventBus, FeedEvent};
///
/// let event_bus = EventBus::new(64);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(FeedEvent::index_activated(3));
///
/// let event = rx.try_recv().unwrap();
/// assert_eq!(event.event_type(), "IndexActivated");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FeedEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered per subscriber before the
    /// oldest are dropped (the subscriber then observes `Lagged`).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: FeedEvent) -> Result<usize, broadcast::error::SendError<FeedEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: FeedEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
