//! Shared broker state: the client directory, topic subscribers and the
//! pending-request table (§4.1 State).

use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;

use crate::message::Message;
use crate::transport::PeerId;
use crate::util::MessageId;

/// A `REQUEST`/`PING` the broker forwarded and is waiting to see answered.
#[derive(Debug, Clone)]
pub(crate) struct PendingRequest {
    pub(crate) source: String,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) timeout: std::time::Duration,
}

impl PendingRequest {
    fn from_message(message: &Message) -> Self {
        Self {
            source: message.source().to_string(),
            timestamp: message.common().timestamp,
            timeout: message.timeout().unwrap_or(crate::message::DEFAULT_TIMEOUT),
        }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match (now - self.timestamp).to_std() {
            Ok(elapsed) => elapsed > self.timeout,
            Err(_) => false,
        }
    }
}

/// Everything the four broker loops share: the directory, subscriptions and
/// the pending-request / seen tables.
#[derive(Debug, Default)]
pub(crate) struct BrokerState {
    pub(crate) clients: DashMap<String, PeerId>,
    pub(crate) topics: DashMap<String, Mutex<Vec<String>>>,
    pub(crate) pending: DashMap<MessageId, PendingRequest>,
    pub(crate) seen: DashSet<MessageId>,
}

impl BrokerState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register (or re-register) `name` at `peer` (§3 invariant 5).
    pub(crate) fn register(&self, name: &str, peer: PeerId) {
        self.clients.insert(name.to_string(), peer);
    }

    pub(crate) fn peer_of(&self, name: &str) -> Option<PeerId> {
        self.clients.get(name).map(|entry| *entry)
    }

    /// Append `subscriber` to `topic`'s list (duplicates permitted, §3 invariant 4).
    pub(crate) fn subscribe(&self, topic: &str, subscriber: &str) {
        self.topics
            .entry(topic.to_string())
            .or_default()
            .lock()
            .push(subscriber.to_string());
    }

    /// Snapshot of `topic`'s current subscriber names, empty if the topic is unknown.
    pub(crate) fn subscribers_of(&self, topic: &str) -> Vec<String> {
        self.topics
            .get(topic)
            .map(|entry| entry.lock().clone())
            .unwrap_or_default()
    }

    /// Names of every registered client except `exclude`.
    pub(crate) fn client_names_excluding(&self, exclude: &str) -> Vec<String> {
        self.clients
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|name| name != exclude)
            .collect()
    }

    /// Record a forwarded `REQUEST`/`PING` so the watchdog can reap it.
    pub(crate) fn track_pending(&self, message: &Message) {
        self.pending
            .insert(message.id(), PendingRequest::from_message(message));
    }

    /// Mark `request_id` answered; the watchdog will clear it from `pending`.
    pub(crate) fn mark_seen(&self, request_id: MessageId) {
        self.seen.insert(request_id);
    }

    /// Sweep `pending`: drop entries that were seen (answered) or have
    /// expired. Returns the number of entries reaped for timeout (for logging).
    pub(crate) fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut timed_out = 0;
        self.pending.retain(|id, entry| {
            if self.seen.remove(id).is_some() {
                return false;
            }
            if entry.is_expired(now) {
                timed_out += 1;
                return false;
            }
            true
        });
        timed_out
    }
}
