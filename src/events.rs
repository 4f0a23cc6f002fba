//! Change notification channel
//!
//! A broadcast fan-out replacing the platform observer mechanism: the
//! repository publishes a change event for every successful mutation, the
//! sync engine publishes "data updated" after a cycle, and the alert
//! evaluator publishes raised alerts. Delivery is fire-and-forget; a slow or
//! absent subscriber never blocks the writer.

use crate::config::SyncStatus;
use crate::db::resource::RateResource;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// Kind of mutation behind a change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// One notification for the whole batch, not one per row
    BulkInsert,
}

/// Direction of a rate fluctuation relative to the rolling average
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FluctuationDirection {
    /// The rate rose above the average
    Positive,
    /// The rate fell below the average
    Negative,
}

/// A raised alert for the tracked pair
#[derive(Debug, Clone, PartialEq)]
pub struct AlertNotification {
    pub from_code: String,
    pub to_code: String,
    pub direction: FluctuationDirection,
    /// Fluctuation magnitude in percent
    pub fluctuation: f64,
}

/// Events observable by UI, widgets and tests
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A successful mutation, tagged with the resource that was written
    Change {
        resource: RateResource,
        kind: ChangeKind,
    },
    /// A sync cycle finished writing fresh data
    DataUpdated { status: SyncStatus },
    /// The alert threshold was exceeded
    Alert(AlertNotification),
}

/// Broadcast bus for [`Event`]s
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Register a new subscriber; dropping the receiver unregisters it.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: Event) {
        // An Err here only means nobody is listening right now.
        if let Err(e) = self.tx.send(event) {
            tracing::trace!("Event dropped, no subscribers: {:?}", e.0);
        }
    }

    pub(crate) fn notify_change(&self, resource: RateResource, kind: ChangeKind) {
        self.publish(Event::Change { resource, kind });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
