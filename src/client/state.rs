//! Shared client state: topic delivery queues and the synchronous-call
//! correlation table (§4.2 State).

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};

use crate::message::Message;
use crate::util::MessageId;

/// Everything the client's three loops share.
#[derive(Default)]
pub(crate) struct ClientState {
    /// Topic name -> delivery queue surfaced to the user by `subscribe()`.
    pub(crate) topics: DashMap<String, mpsc::Sender<Message>>,
    /// Outbound message id -> the slot a synchronous caller is waiting on
    /// (§9 Design Notes: one-shot slot per outbound id, not a polled map).
    pub(crate) responses: DashMap<MessageId, oneshot::Sender<Message>>,
}

impl ClientState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a one-shot slot for `id`, to be resolved by the dispatch loop.
    pub(crate) fn await_response(&self, id: MessageId) -> oneshot::Receiver<Message> {
        let (tx, rx) = oneshot::channel();
        self.responses.insert(id, tx);
        rx
    }

    /// Resolve the slot for `request_id`, if any synchronous caller is
    /// still waiting on it. A missing or already-resolved slot (the caller
    /// timed out and dropped its receiver) is not an error (§8 boundary:
    /// "a late RESPONSE arriving after its caller timed out is discarded").
    pub(crate) fn resolve_response(&self, request_id: MessageId, message: Message) {
        if let Some((_, tx)) = self.responses.remove(&request_id) {
            let _ = tx.send(message);
        }
    }

    /// Drop a no-longer-wanted response slot (used when a synchronous call
    /// times out, so a late reply doesn't leak the map entry).
    pub(crate) fn abandon_response(&self, id: MessageId) {
        self.responses.remove(&id);
    }
}
