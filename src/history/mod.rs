//! Optional, observational message history (§6 Persisted state, §9 Design Notes).
//!
//! Purely a side channel for inspection (a demo's table view, a test
//! assertion) -- nothing in the broker or client reads from it. Bounded only
//! by process memory; no eviction policy.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::message::Message;
use crate::util::MessageId;

/// Which side of a node a recorded message crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The node sent this message onto the transport.
    Sent,
    /// The node received this message from the transport.
    Received,
}

/// One recorded message: enough to reconstruct what happened and when,
/// without retaining the whole [`Message`] (kind/body/id/timestamp only).
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// The recorded message's id.
    pub id: MessageId,
    /// Which direction it crossed the node boundary.
    pub direction: Direction,
    /// The wire kind token, e.g. `"EVENT"`.
    pub kind: &'static str,
    /// The message's payload.
    pub body: String,
    /// The message's own construction timestamp.
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    fn from_message(message: &Message, direction: Direction) -> Self {
        Self {
            id: message.id(),
            direction,
            kind: message.kind_token(),
            body: message.body().to_string(),
            timestamp: message.common().timestamp,
        }
    }
}

/// Append-by-id, lookup-by-id, iterate-in-order (§9 Design Notes).
///
/// Multiple backends can satisfy this; only an in-memory one ships here,
/// since persistence itself is out of scope.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Record `message` as having been sent or received.
    async fn record(&self, message: &Message, direction: Direction);

    /// Look up a previously recorded entry by id.
    async fn get(&self, id: MessageId) -> Option<HistoryEntry>;

    /// Every recorded entry, oldest first.
    async fn entries(&self) -> Vec<HistoryEntry>;
}

/// The default in-memory backend (grounded in the bus's own `InmemBrokerStore`
/// precedent: an append-only list plus linear lookup, adequate at demo scale).
#[derive(Default)]
pub struct InMemoryHistoryStore {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl InMemoryHistoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn record(&self, message: &Message, direction: Direction) {
        self.entries
            .lock()
            .push(HistoryEntry::from_message(message, direction));
    }

    async fn get(&self, id: MessageId) -> Option<HistoryEntry> {
        self.entries
            .lock()
            .iter()
            .find(|entry| entry.id == id)
            .cloned()
    }

    async fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_then_lookup_round_trips() {
        let store = InMemoryHistoryStore::new();
        let message = Message::ping("c1", "c2", std::time::Duration::from_secs(5));
        let id = message.id();

        store.record(&message, Direction::Sent).await;
        let entry = store.get(id).await.unwrap();
        assert_eq!(entry.kind, "PING");
        assert_eq!(entry.direction, Direction::Sent);
    }

    #[tokio::test]
    async fn entries_are_returned_in_insertion_order() {
        let store = InMemoryHistoryStore::new();
        let first = Message::register("c1");
        let second = Message::register("c2");
        store.record(&first, Direction::Received).await;
        store.record(&second, Direction::Received).await;

        let entries = store.entries().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, first.id());
        assert_eq!(entries[1].id, second.id());
    }

    #[tokio::test]
    async fn unknown_id_returns_none() {
        let store = InMemoryHistoryStore::new();
        assert!(store.get(MessageId::new()).await.is_none());
    }
}
