//! The client: a dealer-pattern endpoint bound to a stable name (§4.2).
//!
//! Implementation code lives in [`state`] (shared data) and this file (the
//! three cooperating loops and the public API). [`error`] holds [`ClientError`].

pub mod error;
pub(crate) mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

pub use error::ClientError;
use state::ClientState;

use crate::config::ClientConfig;
use crate::message::{wire, Message, DEFAULT_TIMEOUT};
use crate::transport::{Dealer, TransportError};

const COMMAND_GET_CLIENTS: &str = "GET_CLIENTS";

/// The client itself. Generic over [`Dealer`] so the same API serves both
/// the IPC and TCP transports.
pub struct Client<D: Dealer> {
    name: String,
    dealer: Arc<D>,
    config: ClientConfig,
    state: Arc<ClientState>,
    registered: Arc<AtomicBool>,
    tx_tx: Option<mpsc::Sender<Message>>,
    requests_rx: Option<Arc<Mutex<mpsc::Receiver<Message>>>>,
    stop_tx: Option<watch::Sender<bool>>,
    tasks: Vec<JoinHandle<()>>,
    started: bool,
}

impl<D: Dealer> Client<D> {
    /// Construct a client bound to an already-connected `dealer`, under `name`.
    pub fn new(name: impl Into<String>, dealer: D, config: ClientConfig) -> Self {
        Self {
            name: name.into(),
            dealer: Arc::new(dealer),
            config,
            state: Arc::new(ClientState::new()),
            registered: Arc::new(AtomicBool::new(false)),
            tx_tx: None,
            requests_rx: None,
            stop_tx: None,
            tasks: Vec::new(),
            started: false,
        }
    }

    /// This client's registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` once `REGISTER`'s `ACK` has arrived.
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    /// Launch the three loops, send `REGISTER`, and wait for its `ACK`
    /// (bounded by [`ClientConfig::register_timeout`]).
    pub async fn start(&mut self) -> Result<(), ClientError> {
        if self.started {
            tracing::warn!(client = %self.name, "client already started, ignoring start()");
            return Ok(());
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let (rx_tx, rx_rx) = mpsc::channel::<Message>(self.config.channel_capacity);
        let (tx_tx, tx_rx) = mpsc::channel::<Message>(self.config.channel_capacity);
        let (requests_tx, requests_rx) = mpsc::channel::<Message>(self.config.channel_capacity);

        self.tasks.push(tokio::spawn(listen_loop(
            Arc::clone(&self.dealer),
            rx_tx,
            stop_rx.clone(),
        )));
        self.tasks.push(tokio::spawn(dispatch_loop(
            Arc::clone(&self.state),
            self.name.clone(),
            rx_rx,
            tx_tx.clone(),
            requests_tx,
            stop_rx.clone(),
        )));
        self.tasks.push(tokio::spawn(send_loop(
            Arc::clone(&self.dealer),
            tx_rx,
            stop_rx,
        )));

        self.stop_tx = Some(stop_tx);
        self.tx_tx = Some(tx_tx);
        self.requests_rx = Some(Arc::new(Mutex::new(requests_rx)));
        self.started = true;

        let register = Message::register(self.name.clone());
        match self
            .call(register, self.config.register_timeout, "broker")
            .await
        {
            Ok(_) => {
                self.registered.store(true, Ordering::SeqCst);
                Ok(())
            }
            Err(error) => {
                self.stop().await;
                Err(error)
            }
        }
    }

    /// Signal all loops to stop and wait for them to exit. Idempotent.
    pub async fn stop(&mut self) {
        if !self.started {
            tracing::warn!(client = %self.name, "stop() called before start(), ignoring");
            return;
        }
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        self.tx_tx = None;
        self.requests_rx = None;
        self.registered.store(false, Ordering::SeqCst);
        self.started = false;
    }

    /// Submit `message`, wait up to `timeout` for the correlated reply.
    async fn call(
        &self,
        message: Message,
        timeout: Duration,
        target_label: &str,
    ) -> Result<Message, ClientError> {
        let tx_tx = self
            .tx_tx
            .as_ref()
            .ok_or_else(|| ClientError::Lifecycle("client not started".to_string()))?;
        let id = message.id();
        let waiter = self.state.await_response(id);

        tx_tx
            .send(message)
            .await
            .map_err(|_| ClientError::Transport(TransportError::Closed))?;

        match tokio::time::timeout(timeout, waiter).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ClientError::Transport(TransportError::Closed)),
            Err(_) => {
                self.state.abandon_response(id);
                Err(ClientError::Timeout {
                    target: target_label.to_string(),
                })
            }
        }
    }

    /// Subscribe to `topic`, returning a consumer queue of `EVENT`s on it.
    pub async fn subscribe(
        &self,
        topic: impl Into<String>,
    ) -> Result<mpsc::Receiver<Message>, ClientError> {
        let topic = topic.into();
        let (delivery_tx, delivery_rx) = mpsc::channel(self.config.channel_capacity);
        self.state.topics.insert(topic.clone(), delivery_tx);

        let message = self.generate_subscribe(&topic);
        self.call(message, self.config.register_timeout, "broker")
            .await?;
        Ok(delivery_rx)
    }

    /// Enqueue `event` for publication. Non-blocking; no delivery acknowledgement.
    pub fn publish(&self, event: Message) -> Result<(), ClientError> {
        let tx_tx = self
            .tx_tx
            .as_ref()
            .ok_or_else(|| ClientError::Lifecycle("client not started".to_string()))?;
        tx_tx
            .try_send(event)
            .map_err(|_| ClientError::Transport(TransportError::Closed))
    }

    /// Send `req` and block for up to `req`'s own timeout for the matching `RESPONSE`.
    pub async fn request(&self, req: Message) -> Result<Message, ClientError> {
        let target = req.target().unwrap_or_default().to_string();
        let timeout = req.timeout().unwrap_or(DEFAULT_TIMEOUT);
        self.call(req, timeout, &target).await
    }

    /// Reply to an incoming `REQUEST` with `body`, correlated back to its source.
    pub fn respond(&self, req: &Message, body: impl Into<String>) -> Result<(), ClientError> {
        let tx_tx = self
            .tx_tx
            .as_ref()
            .ok_or_else(|| ClientError::Lifecycle("client not started".to_string()))?;
        let response = Message::response(self.name.clone(), req.source(), req.id(), body);
        tx_tx
            .try_send(response)
            .map_err(|_| ClientError::Transport(TransportError::Closed))
    }

    /// `true` iff a `PONG` from `target` arrives within the ping timeout.
    pub async fn ping(&self, target: impl Into<String>) -> bool {
        let target = target.into();
        let message = Message::ping(self.name.clone(), target.clone(), DEFAULT_TIMEOUT);
        self.call(message, DEFAULT_TIMEOUT, &target).await.is_ok()
    }

    /// The names of every other currently registered client.
    pub async fn get_clients(&self) -> Result<Vec<String>, ClientError> {
        let message = Message::command(
            self.name.clone(),
            "broker",
            COMMAND_GET_CLIENTS,
            DEFAULT_TIMEOUT,
        );
        let response = self.call(message, DEFAULT_TIMEOUT, "broker").await?;
        Ok(response
            .body()
            .split(',')
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Wait for the next incoming `REQUEST`, or `None` once the client has stopped.
    pub async fn next_request(&self) -> Option<Message> {
        let requests_rx = self.requests_rx.as_ref()?;
        requests_rx.lock().await.recv().await
    }

    /// Build a `REQUEST` addressed to `target` with `source = self.name()`.
    pub fn generate_request(
        &self,
        target: impl Into<String>,
        body: impl Into<String>,
        timeout: Duration,
    ) -> Message {
        Message::request(self.name.clone(), target, body, timeout)
    }

    /// Build an `EVENT` on `topic` with `source = self.name()`.
    pub fn generate_event(&self, topic: impl Into<String>, body: impl Into<String>) -> Message {
        Message::event(self.name.clone(), topic, body)
    }

    fn generate_subscribe(&self, topic: impl Into<String>) -> Message {
        Message::subscribe(self.name.clone(), topic)
    }
}

async fn listen_loop<D: Dealer>(
    dealer: Arc<D>,
    rx_tx: mpsc::Sender<Message>,
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
            frame = dealer.recv() => {
                match frame {
                    Some(payload) if !payload.is_empty() => {
                        match wire::decode(&payload) {
                            Ok(message) => {
                                if rx_tx.send(message).await.is_err() {
                                    break;
                                }
                            }
                            Err(error) => tracing::warn!(%error, "dropping malformed frame"),
                        }
                    }
                    Some(_) => continue,
                    None => break,
                }
            }
        }
    }
}

async fn dispatch_loop(
    state: Arc<ClientState>,
    own_name: String,
    mut rx_rx: mpsc::Receiver<Message>,
    tx_tx: mpsc::Sender<Message>,
    requests_tx: mpsc::Sender<Message>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        let message = tokio::select! {
            biased;
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    break;
                }
                continue;
            }
            item = rx_rx.recv() => match item {
                Some(message) => message,
                None => break,
            },
        };

        match &message {
            Message::Event { topic, .. } => {
                if let Some(sender) = state.topics.get(topic) {
                    let _ = sender.send(message.clone()).await;
                } else {
                    tracing::debug!(%topic, "event for unsubscribed topic, dropping");
                }
            }
            Message::Ping { .. } => {
                let pong = Message::pong(own_name.clone(), message.source(), message.id());
                if tx_tx.send(pong).await.is_err() {
                    break;
                }
            }
            Message::Request { .. } => {
                if requests_tx.send(message).await.is_err() {
                    break;
                }
            }
            Message::Response { .. } | Message::Pong { .. } | Message::Ack { .. } => {
                if let Some(request_id) = message.request_id() {
                    state.resolve_response(request_id, message);
                }
            }
            Message::Register { .. } | Message::Subscribe { .. } | Message::Command { .. } => {
                tracing::debug!(kind = message.kind_token(), "unexpected inbound kind, dropping");
            }
        }
    }
}

async fn send_loop<D: Dealer>(
    dealer: Arc<D>,
    mut tx_rx: mpsc::Receiver<Message>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        let message = tokio::select! {
            biased;
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    break;
                }
                continue;
            }
            item = tx_rx.recv() => match item {
                Some(message) => message,
                None => break,
            },
        };

        let frame = match wire::encode(&message) {
            Ok(frame) => frame,
            Err(error) => {
                tracing::warn!(%error, "failed to encode outbound message, dropping");
                continue;
            }
        };
        if let Err(error) = dealer.send(frame) {
            tracing::warn!(%error, "failed to send, dropping");
        }
    }
}
