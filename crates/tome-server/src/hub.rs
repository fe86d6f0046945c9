//! Journal broadcast hub: fan-out of entry events to WebSocket viewers.
//!
//! The hub maps a journal id to the set of live subscriptions for that
//! journal. Each subscription carries the resolved viewer identity and a
//! bounded outbound queue; the socket task drains the queue. Delivery runs
//! under the subscription map's write lock, which is the single
//! serialization point: publishes for a journal are totally ordered, and
//! subscribe/unsubscribe can never interleave with a delivery pass.

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tome_journals::filter::entry_visible_to;
use tome_journals::JournalEntry;
use uuid::Uuid;

/// Capacity of each subscriber's outbound queue. A viewer that falls this
/// far behind is disconnected rather than allowed to buffer without bound.
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

/// An entry lifecycle event flowing through the hub.
///
/// `EntryDeleted` carries the full pre-delete entry, not just its id: the
/// visibility gate needs the entry's last-known author and privacy flag to
/// decide who may learn about the deletion. Only the id goes on the wire.
#[derive(Debug, Clone)]
pub enum JournalEvent {
    EntryCreated(JournalEntry),
    EntryUpdated(JournalEntry),
    EntryDeleted(JournalEntry),
}

impl JournalEvent {
    fn entry(&self) -> &JournalEntry {
        match self {
            JournalEvent::EntryCreated(e)
            | JournalEvent::EntryUpdated(e)
            | JournalEvent::EntryDeleted(e) => e,
        }
    }

    /// Whether this event may be delivered to the given viewer.
    fn visible_to(&self, viewer: Option<&str>) -> bool {
        entry_visible_to(self.entry(), viewer)
    }

    /// Serializes the event into its wire frame:
    /// `{"event": "new_entry" | "update_entry" | "delete_entry", "data": ...}`.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        let frame = match self {
            JournalEvent::EntryCreated(e) => json!({"event": "new_entry", "data": e}),
            JournalEvent::EntryUpdated(e) => json!({"event": "update_entry", "data": e}),
            JournalEvent::EntryDeleted(e) => {
                json!({"event": "delete_entry", "data": {"id": e.id}})
            }
        };
        serde_json::to_string(&frame)
    }
}

/// One live subscription: the viewer's identity plus its outbound queue.
struct Subscriber {
    /// Resolved username, or `None` for an anonymous viewer.
    identity: Option<String>,
    tx: mpsc::Sender<String>,
}

type SubscriptionMap = HashMap<i64, HashMap<Uuid, Subscriber>>;

/// Fan-out hub for journal entry events. Cheap to clone; lives in `AppState`.
#[derive(Clone, Default)]
pub struct JournalHub {
    subscriptions: Arc<RwLock<SubscriptionMap>>,
}

impl JournalHub {
    pub fn new() -> Self {
        Self {
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers a subscription for a journal and returns its id together
    /// with the receiving end of the outbound queue.
    ///
    /// Subscribing to a journal id that does not (yet) exist succeeds and
    /// simply waits; events arrive once entries are published under that id.
    pub async fn subscribe(
        &self,
        journal_id: i64,
        identity: Option<String>,
    ) -> (Uuid, mpsc::Receiver<String>) {
        let subscription_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);

        let mut subs = self.subscriptions.write().await;
        subs.entry(journal_id)
            .or_default()
            .insert(subscription_id, Subscriber { identity, tx });

        (subscription_id, rx)
    }

    /// Removes a subscription. A stale or unknown id is a no-op.
    pub async fn unsubscribe(&self, journal_id: i64, subscription_id: Uuid) {
        let mut subs = self.subscriptions.write().await;
        if let Some(viewers) = subs.get_mut(&journal_id) {
            viewers.remove(&subscription_id);
            if viewers.is_empty() {
                subs.remove(&journal_id);
            }
        }
    }

    /// Delivers an event to every subscriber of a journal that is allowed
    /// to see it.
    ///
    /// Enqueueing is non-blocking: a subscriber whose queue is full (or
    /// whose socket task has gone away) is deregistered within the same
    /// pass, so it can never receive a later event after missing an
    /// earlier one.
    pub async fn publish(&self, journal_id: i64, event: &JournalEvent) {
        let frame = match event.to_wire() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(journal_id, "failed to serialize journal event: {}", e);
                return;
            }
        };

        let mut subs = self.subscriptions.write().await;
        let Some(viewers) = subs.get_mut(&journal_id) else {
            return;
        };

        let mut dead = Vec::new();
        for (id, subscriber) in viewers.iter() {
            if !event.visible_to(subscriber.identity.as_deref()) {
                continue;
            }
            if let Err(e) = subscriber.tx.try_send(frame.clone()) {
                tracing::warn!(
                    journal_id,
                    subscription_id = %id,
                    "dropping journal subscriber: {}",
                    e
                );
                dead.push(*id);
            }
        }

        for id in dead {
            viewers.remove(&id);
        }
        if viewers.is_empty() {
            subs.remove(&journal_id);
        }
    }

    /// Number of live subscriptions for a journal.
    pub async fn subscriber_count(&self, journal_id: i64) -> usize {
        let subs = self.subscriptions.read().await;
        subs.get(&journal_id).map_or(0, HashMap::len)
    }
}
