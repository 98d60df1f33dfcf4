//! IPC transport: a router/dealer pattern over a Unix domain socket rendezvous.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::error::TransportError;
use super::framed::{spawn_line_reader, spawn_line_writer};
use super::identity::{PeerId, PeerIdAllocator};

const CHANNEL_CAPACITY: usize = 1024;

/// Broker-side router socket bound to an IPC rendezvous path.
///
/// Each accepted connection is treated as one dealer peer: a background
/// task reads lines from it and forwards `(PeerId, frame)` pairs into a
/// single channel that [`IpcRouter::recv`] drains (the broker's Listen
/// role), and a second background task owns the write half and drains a
/// per-peer outbound channel that [`IpcRouter::send`] feeds (the broker's
/// Send role).
pub struct IpcRouter {
    rx: Mutex<mpsc::Receiver<(PeerId, String)>>,
    senders: Arc<DashMap<PeerId, mpsc::Sender<String>>>,
    _accept_task: JoinHandle<()>,
}

impl IpcRouter {
    /// Bind the rendezvous path and start accepting connections.
    pub async fn bind(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).map_err(|source| TransportError::Bind {
            address: path.display().to_string(),
            source,
        })?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let senders: Arc<DashMap<PeerId, mpsc::Sender<String>>> = Arc::new(DashMap::new());
        let allocator = Arc::new(PeerIdAllocator::new());

        let accept_task = tokio::spawn(accept_loop(
            listener,
            tx,
            Arc::clone(&senders),
            allocator,
        ));

        Ok(Self {
            rx: Mutex::new(rx),
            senders,
            _accept_task: accept_task,
        })
    }

    /// Receive the next `(peer, frame)` pair. `None` once the listener and
    /// every connection have shut down.
    pub async fn recv(&self) -> Option<(PeerId, String)> {
        self.rx.lock().await.recv().await
    }

    /// Enqueue a frame for delivery to `peer`. Unknown or disconnected peers
    /// are reported so the caller can log and drop (§4.1 Send).
    pub fn send(&self, peer: PeerId, frame: String) -> Result<(), TransportError> {
        let sender = self
            .senders
            .get(&peer)
            .ok_or_else(|| TransportError::UnknownPeer(peer.to_string()))?;
        sender.try_send(frame).map_err(|_| TransportError::Closed)
    }
}

async fn accept_loop(
    listener: UnixListener,
    frames: mpsc::Sender<(PeerId, String)>,
    senders: Arc<DashMap<PeerId, mpsc::Sender<String>>>,
    allocator: Arc<PeerIdAllocator>,
) {
    loop {
        let (stream, _addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(error) => {
                tracing::warn!(%error, "ipc accept failed");
                continue;
            }
        };
        let peer = allocator.next();
        let (read_half, write_half) = stream.into_split();

        let (out_tx, out_rx) = mpsc::channel(CHANNEL_CAPACITY);
        senders.insert(peer, out_tx);
        tokio::spawn(spawn_line_writer(write_half, out_rx));

        let frames = frames.clone();
        tokio::spawn(async move {
            let (line_tx, mut line_rx) = mpsc::channel(CHANNEL_CAPACITY);
            let reader = tokio::spawn(spawn_line_reader(read_half, line_tx));
            while let Some(line) = line_rx.recv().await {
                if frames.send((peer, line)).await.is_err() {
                    break;
                }
            }
            let _ = reader.await;
        });
    }
}

/// Dealer-side socket connected to an IPC rendezvous path.
pub struct IpcDealer {
    rx: Mutex<mpsc::Receiver<String>>,
    tx: mpsc::Sender<String>,
    _reader_task: JoinHandle<()>,
    _writer_task: JoinHandle<()>,
}

impl IpcDealer {
    /// Connect to a broker listening at `path`.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let path = path.as_ref().to_path_buf();
        let stream = UnixStream::connect(&path)
            .await
            .map_err(|source| TransportError::Connect {
                address: path.display().to_string(),
                source,
            })?;
        let (read_half, write_half) = stream.into_split();

        let (in_tx, in_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (out_tx, out_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let reader_task = tokio::spawn(spawn_line_reader(read_half, in_tx));
        let writer_task = tokio::spawn(spawn_line_writer(write_half, out_rx));

        Ok(Self {
            rx: Mutex::new(in_rx),
            tx: out_tx,
            _reader_task: reader_task,
            _writer_task: writer_task,
        })
    }

    /// Receive the next frame from the broker. `None` once the connection closes.
    pub async fn recv(&self) -> Option<String> {
        self.rx.lock().await.recv().await
    }

    /// Enqueue a frame for delivery to the broker.
    pub fn send(&self, frame: String) -> Result<(), TransportError> {
        self.tx.try_send(frame).map_err(|_| TransportError::Closed)
    }
}
