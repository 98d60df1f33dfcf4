//! The broker: a router-pattern endpoint that owns the client directory,
//! topic subscriptions and the pending-request table (§4.1).
//!
//! Implementation code lives in [`state`] (shared data) and this file (the
//! four cooperating loops). [`error`] holds [`BrokerError`].

pub mod error;
pub(crate) mod state;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub use error::BrokerError;
use state::BrokerState;

use crate::config::BrokerConfig;
use crate::message::{wire, Message};
use crate::transport::{PeerId, Router};

/// A message queued for delivery to a named destination, resolved to a
/// transport identity by the send loop (§4.1 Send).
struct Outbound {
    destination: String,
    message: Message,
}

/// The broker itself. Generic over [`Router`] so the same loops serve both
/// the IPC and TCP transports.
pub struct Broker<R: Router> {
    router: Arc<R>,
    config: BrokerConfig,
    state: Arc<BrokerState>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
    started: bool,
}

impl<R: Router> Broker<R> {
    /// Construct a broker bound to an already-listening `router`.
    pub fn new(router: R, config: BrokerConfig) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            router: Arc::new(router),
            config,
            state: Arc::new(BrokerState::new()),
            stop_tx,
            stop_rx,
            tasks: Vec::new(),
            started: false,
        }
    }

    /// Start the four cooperating loops (§4.1: Listen, Handle, Send, Watch).
    pub fn start(&mut self) -> Result<(), BrokerError> {
        if self.started {
            tracing::warn!("broker already started, ignoring start()");
            return Ok(());
        }
        self.started = true;

        let (rx_tx, rx_rx) = mpsc::channel::<(PeerId, String)>(self.config.channel_capacity);
        let (tx_tx, tx_rx) = mpsc::channel::<Outbound>(self.config.channel_capacity);

        self.tasks.push(tokio::spawn(listen_loop(
            Arc::clone(&self.router),
            rx_tx,
            self.stop_rx.clone(),
        )));
        self.tasks.push(tokio::spawn(handle_loop(
            Arc::clone(&self.state),
            rx_rx,
            tx_tx,
            self.stop_rx.clone(),
        )));
        self.tasks.push(tokio::spawn(send_loop(
            Arc::clone(&self.router),
            Arc::clone(&self.state),
            tx_rx,
            self.config.latency_range,
            self.stop_rx.clone(),
        )));
        self.tasks.push(tokio::spawn(watch_loop(
            Arc::clone(&self.state),
            self.config.watchdog_interval,
            self.stop_rx.clone(),
        )));

        Ok(())
    }

    /// Signal every loop to stop and wait for them to exit. Idempotent.
    pub async fn stop(&mut self) {
        if !self.started {
            tracing::warn!("stop() called before start(), ignoring");
            return;
        }
        let _ = self.stop_tx.send(true);
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        self.started = false;
    }

    /// Names of every registered client (test/inspection helper).
    pub fn client_names(&self) -> Vec<String> {
        self.state.client_names_excluding("")
    }

    /// Number of `REQUEST`/`PING`/peer-`COMMAND`s still awaiting an answer
    /// (test/inspection helper; exercised by the watchdog sweep in [`watch_loop`]).
    pub fn pending_count(&self) -> usize {
        self.state.pending.len()
    }
}

async fn listen_loop<R: Router>(
    router: Arc<R>,
    rx_tx: mpsc::Sender<(PeerId, String)>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    break;
                }
            }
            frame = router.recv() => {
                match frame {
                    Some((peer, payload)) => {
                        if payload.is_empty() {
                            continue;
                        }
                        if rx_tx.send((peer, payload)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
}

async fn handle_loop(
    state: Arc<BrokerState>,
    mut rx_rx: mpsc::Receiver<(PeerId, String)>,
    tx_tx: mpsc::Sender<Outbound>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        let (peer, frame) = tokio::select! {
            biased;
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    break;
                }
                continue;
            }
            item = rx_rx.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };

        let message = match wire::decode(&frame) {
            Ok(message) => message,
            Err(error) => {
                tracing::warn!(%error, "dropping malformed frame");
                continue;
            }
        };

        for outbound in dispatch(&state, peer, message) {
            if tx_tx.send(outbound).await.is_err() {
                break;
            }
        }
    }
}

/// Pure dispatch logic: given the broker's state and an inbound message,
/// decide the resulting outbound messages (§4.1 Handle).
fn dispatch(state: &BrokerState, peer: PeerId, message: Message) -> Vec<Outbound> {
    let source = message.source().to_string();
    match &message {
        Message::Register { .. } => {
            state.register(&source, peer);
            vec![Outbound {
                destination: source.clone(),
                message: Message::ack("broker", &source, message.id()),
            }]
        }
        Message::Subscribe { topic, .. } => {
            state.subscribe(topic, &source);
            vec![Outbound {
                destination: source.clone(),
                message: Message::ack("broker", &source, message.id()),
            }]
        }
        Message::Event { topic, .. } => {
            let subscribers = state.subscribers_of(topic);
            if subscribers.is_empty() {
                tracing::warn!(%topic, "event has no subscribers, dropping");
                return Vec::new();
            }
            subscribers
                .into_iter()
                .map(|subscriber| Outbound {
                    destination: subscriber,
                    message: message.clone(),
                })
                .collect()
        }
        Message::Request { target, .. } | Message::Ping { target, .. } => {
            state.track_pending(&message);
            vec![Outbound {
                destination: target.clone(),
                message,
            }]
        }
        Message::Command { target, body, .. } if target == "broker" => {
            vec![Outbound {
                destination: source.clone(),
                message: handle_command(state, &source, message.id(), body),
            }]
        }
        Message::Command { target, .. } => {
            state.track_pending(&message);
            vec![Outbound {
                destination: target.clone(),
                message,
            }]
        }
        Message::Response { requestor, .. }
        | Message::Pong { requestor, .. }
        | Message::Ack { requestor, .. } => {
            if let Some(request_id) = message.request_id() {
                state.mark_seen(request_id);
            }
            vec![Outbound {
                destination: requestor.clone(),
                message,
            }]
        }
    }
}

/// The broker's one interpreted command body, `GET_CLIENTS` (§4.1 Handle).
const COMMAND_GET_CLIENTS: &str = "GET_CLIENTS";

fn handle_command(
    state: &BrokerState,
    source: &str,
    request_id: crate::util::MessageId,
    body: &str,
) -> Message {
    let reply_body = match body {
        COMMAND_GET_CLIENTS => state.client_names_excluding(source).join(","),
        other => format!("ERROR: unknown command {other}"),
    };
    Message::response("broker", source, request_id, reply_body)
}

async fn send_loop<R: Router>(
    router: Arc<R>,
    state: Arc<BrokerState>,
    mut tx_rx: mpsc::Receiver<Outbound>,
    latency_range: Option<(Duration, Duration)>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        let outbound = tokio::select! {
            biased;
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    break;
                }
                continue;
            }
            item = tx_rx.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };

        let Some(peer) = state.peer_of(&outbound.destination) else {
            tracing::warn!(destination = %outbound.destination, "unknown destination, dropping");
            continue;
        };

        if let Some((lower, upper)) = latency_range {
            let delay = sample_latency(lower, upper);
            tokio::time::sleep(delay).await;
        }

        let frame = match wire::encode(&outbound.message) {
            Ok(frame) => frame,
            Err(error) => {
                tracing::warn!(%error, "failed to encode outbound message, dropping");
                continue;
            }
        };

        if let Err(error) = router.send(peer, frame) {
            tracing::warn!(%error, destination = %outbound.destination, "failed to send, dropping");
        }
    }
}

fn sample_latency(lower: Duration, upper: Duration) -> Duration {
    if lower >= upper {
        return lower;
    }
    let lower_ns = lower.as_nanos() as u64;
    let upper_ns = upper.as_nanos() as u64;
    let sampled = rand::thread_rng().gen_range(lower_ns..=upper_ns);
    Duration::from_nanos(sampled)
}

async fn watch_loop(
    state: Arc<BrokerState>,
    interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let timed_out = state.sweep(Utc::now());
                if timed_out > 0 {
                    tracing::warn!(count = timed_out, "reaped timed-out pending requests");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::transport::identity::PeerIdAllocator;

    fn peer() -> PeerId {
        PeerIdAllocator::new().next()
    }

    #[test]
    fn register_dispatch_produces_ack() {
        let state = BrokerState::new();
        let message = Message::register("c1");
        let id = message.id();
        let outbound = dispatch(&state, peer(), message);

        assert_eq!(outbound.len(), 1);
        assert_eq!(outbound[0].destination, "c1");
        assert_eq!(outbound[0].message.request_id(), Some(id));
        assert!(state.peer_of("c1").is_some());
    }

    #[test]
    fn subscribe_dispatch_registers_subscriber_and_acks() {
        let state = BrokerState::new();
        let message = Message::subscribe("c1", "t");
        let outbound = dispatch(&state, peer(), message);

        assert_eq!(outbound.len(), 1);
        assert_eq!(state.subscribers_of("t"), vec!["c1"]);
    }

    #[test]
    fn event_with_no_subscribers_drops_silently() {
        let state = BrokerState::new();
        let message = Message::event("c2", "unused", "x");
        assert!(dispatch(&state, peer(), message).is_empty());
    }

    #[test]
    fn event_fans_out_to_every_subscriber() {
        let state = BrokerState::new();
        state.subscribe("t", "c1");
        state.subscribe("t", "c3");
        let message = Message::event("c2", "t", "hello world");
        let outbound = dispatch(&state, peer(), message);

        let mut destinations: Vec<_> = outbound.iter().map(|o| o.destination.clone()).collect();
        destinations.sort();
        assert_eq!(destinations, vec!["c1", "c3"]);
        assert_eq!(outbound[0].message.body(), "hello world");
    }

    #[test]
    fn request_is_tracked_and_forwarded() {
        let state = BrokerState::new();
        let message = Message::request("c1", "c2", "hi", Duration::from_secs(5));
        let id = message.id();
        let outbound = dispatch(&state, peer(), message);

        assert_eq!(outbound.len(), 1);
        assert_eq!(outbound[0].destination, "c2");
        assert!(state.pending.contains_key(&id));
    }

    #[test]
    fn get_clients_command_excludes_requester() {
        let state = BrokerState::new();
        state.register("c1", peer());
        state.register("c2", peer());
        let message = Message::command("c1", "broker", COMMAND_GET_CLIENTS, Duration::from_secs(5));
        let outbound = dispatch(&state, peer(), message);

        assert_eq!(outbound.len(), 1);
        assert_eq!(outbound[0].destination, "c1");
        assert_eq!(outbound[0].message.body(), "c2");
    }

    #[test]
    fn unknown_command_produces_error_response() {
        let state = BrokerState::new();
        let message = Message::command("c1", "broker", "NONSENSE", Duration::from_secs(5));
        let outbound = dispatch(&state, peer(), message);

        assert!(outbound[0].message.body().starts_with("ERROR"));
    }

    #[test]
    fn response_marks_seen_and_routes_to_requestor() {
        let state = BrokerState::new();
        let ping = Message::ping("c1", "c2", Duration::from_secs(5));
        let ping_id = ping.id();
        state.track_pending(&ping);

        let pong = Message::pong("c2", "c1", ping_id);
        let outbound = dispatch(&state, peer(), pong);

        assert_eq!(outbound.len(), 1);
        assert_eq!(outbound[0].destination, "c1");
        assert!(state.seen.contains(&ping_id));
    }

    #[test]
    fn sample_latency_respects_bounds() {
        let lower = Duration::from_millis(1);
        let upper = Duration::from_millis(5);
        for _ in 0..50 {
            let sampled = sample_latency(lower, upper);
            assert!(sampled >= lower && sampled <= upper);
        }
    }
}
