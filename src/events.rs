//! Typed publish/subscribe boundary toward the UI layer.
//!
//! Delivery is synchronous and in subscription order. Handlers run on the
//! sensor delivery thread, so a slow handler delays the next sample; use
//! [`EventChannel::subscribe_queued`] to hand events to another thread
//! through a bounded queue instead.
//!
//! Handlers must not panic. A panic unwinds through the platform's delivery
//! callback and skips the remaining subscribers and listeners for that sample.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// Outbound events, serialised with the names and keys the UI listens for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Event {
    CompassUpdate {
        #[serde(rename = "azimuth")]
        azimuth_degrees: f32,
    },
    StepUpdate {
        #[serde(rename = "steps")]
        count: f32,
    },
    CompassError {
        #[serde(rename = "error")]
        message: String,
    },
}

impl Event {
    #[inline]
    pub fn kind(&self) -> EventKind {
        match self {
            Event::CompassUpdate { .. } => EventKind::CompassUpdate,
            Event::StepUpdate { .. } => EventKind::StepUpdate,
            Event::CompassError { .. } => EventKind::CompassError,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Event::CompassError {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    CompassUpdate,
    StepUpdate,
    CompassError,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [
        EventKind::CompassUpdate,
        EventKind::StepUpdate,
        EventKind::CompassError,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::CompassUpdate => "CompassUpdate",
            EventKind::StepUpdate => "StepUpdate",
            EventKind::CompassError => "CompassError",
        }
    }

    #[inline]
    fn slot(&self) -> usize {
        match self {
            EventKind::CompassUpdate => 0,
            EventKind::StepUpdate => 1,
            EventKind::CompassError => 2,
        }
    }
}

/// Opaque token returned by `subscribe`, consumed by `unsubscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    kind: EventKind,
}

impl SubscriptionHandle {
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

struct Subscriber {
    id: u64,
    handler: Handler,
}

/// Many-producer, many-subscriber synchronous event fan-out.
///
/// No buffering or replay: subscribers only see events published after
/// they joined.
pub struct EventChannel {
    subscribers: [RwLock<Vec<Subscriber>>; 3],
    next_id: AtomicU64,
    dropped: Arc<AtomicU64>,
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("compass_update", &self.subscriber_count(EventKind::CompassUpdate))
            .field("step_update", &self.subscriber_count(EventKind::StepUpdate))
            .field("compass_error", &self.subscriber_count(EventKind::CompassError))
            .finish()
    }
}

impl EventChannel {
    pub fn new() -> Self {
        Self {
            subscribers: Default::default(),
            next_id: AtomicU64::new(1),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register `handler` for one event kind
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionHandle
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers[kind.slot()].write().push(Subscriber {
            id,
            handler: Arc::new(handler),
        });
        trace!(kind = kind.name(), id, "subscriber added");
        SubscriptionHandle { id, kind }
    }

    /// Subscribe through a bounded queue; a full queue drops the event for
    /// this subscriber only and bumps [`EventChannel::dropped_count`].
    pub fn subscribe_queued(&self, kind: EventKind, capacity: usize) -> (SubscriptionHandle, Receiver<Event>) {
        let (tx, rx): (Sender<Event>, Receiver<Event>) = bounded(capacity.max(1));
        let dropped = Arc::clone(&self.dropped);
        let handle = self.subscribe(kind, move |event| match tx.try_send(event.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                dropped.fetch_add(1, Ordering::Relaxed);
                warn!(kind = kind.name(), "event queue full, dropping event");
            }
            Err(TrySendError::Disconnected(_)) => {
                trace!(kind = kind.name(), "queued subscriber disconnected");
            }
        });
        (handle, rx)
    }

    /// Remove a subscription; returns `false` if it was already gone
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut subscribers = self.subscribers[handle.kind.slot()].write();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != handle.id);
        subscribers.len() != before
    }

    /// Deliver to every current subscriber of the event's kind, returning
    /// how many handlers ran.
    ///
    /// The subscriber list is snapshotted first, so handlers may subscribe
    /// or unsubscribe without deadlocking.
    pub fn publish(&self, event: &Event) -> usize {
        let handlers: Vec<Handler> = self.subscribers[event.kind().slot()]
            .read()
            .iter()
            .map(|s| Arc::clone(&s.handler))
            .collect();

        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers[kind.slot()].read().len()
    }

    /// Events discarded because a queued subscriber was full
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
