//! TCP transport secured by a CURVE-style public-key handshake (§6).
//!
//! Certificate *file* layout is out of scope; this module only cares about
//! the in-memory keys once they're loaded. Before either side switches into
//! the newline-framed mode shared with [`super::ipc`], each connection does
//! one line-based handshake: both sides send their x25519 public key as a
//! hex string, the dealer verifies the router's key against the pinned key
//! it was configured with, and both derive the Diffie-Hellman shared secret.
//!
//! TODO: the shared secret isn't used to encrypt frames yet. Authentication
//! (pinned-key verification) is enforced; confidentiality is not.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use x25519_dalek::{PublicKey, SharedSecret, StaticSecret};

use super::error::TransportError;
use super::framed::{spawn_line_reader, spawn_line_writer};
use super::identity::{PeerId, PeerIdAllocator};

const CHANNEL_CAPACITY: usize = 1024;

/// A 32-byte x25519 secret key plus its corresponding public key, as would be
/// loaded from one identity's pair of certificate files.
#[derive(Clone)]
pub struct Keypair {
    secret: StaticSecret,
    public: PublicKey,
}

impl Keypair {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random();
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Reconstruct a keypair from a 32-byte secret key.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// The raw secret bytes, for writing out a `.secret` certificate file.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    /// The public half, as sent over the wire during the handshake.
    pub fn public(&self) -> PublicKey {
        self.public
    }
}

/// Hex-encode a public key, the form it takes on the wire during the
/// handshake and when written to a `.public` certificate file.
pub fn encode_public(key: &PublicKey) -> String {
    hex::encode(key.as_bytes())
}

/// Decode a hex-encoded public key, the inverse of [`encode_public`].
pub fn decode_public(hex_str: &str) -> Result<PublicKey, TransportError> {
    let decoded = hex::decode(hex_str)
        .map_err(|error| TransportError::Handshake(format!("invalid hex in public key: {error}")))?;
    let bytes: [u8; 32] = decoded.try_into().map_err(|bytes: Vec<u8>| {
        TransportError::Handshake(format!(
            "expected 32 bytes for a public key, got {}",
            bytes.len()
        ))
    })?;
    Ok(PublicKey::from(bytes))
}

async fn send_line(writer: &mut (impl AsyncWriteExt + Unpin), line: &str) -> Result<(), TransportError> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

async fn read_line(
    reader: &mut (impl AsyncBufReadExt + Unpin),
) -> Result<String, TransportError> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(TransportError::Handshake(
            "peer closed connection during handshake".to_string(),
        ));
    }
    Ok(line.trim_end().to_string())
}

/// Server side of the handshake: send our public key, read theirs, derive
/// the shared secret. The router doesn't pin any particular client key
/// (per §6, authorization beyond transport-layer keying is out of scope).
async fn server_handshake(
    stream: &mut TcpStream,
    keypair: &Keypair,
) -> Result<(PublicKey, SharedSecret), TransportError> {
    let (read_half, mut write_half) = stream.split();
    let mut reader = BufReader::new(read_half);

    send_line(&mut write_half, &encode_public(&keypair.public)).await?;
    let peer_hex = read_line(&mut reader).await?;
    let peer_public = decode_public(&peer_hex)?;
    let shared = keypair.secret.diffie_hellman(&peer_public);
    Ok((peer_public, shared))
}

/// Client side of the handshake: read the server's public key and verify it
/// matches the pinned key before trusting the connection.
async fn client_handshake(
    stream: &mut TcpStream,
    keypair: &Keypair,
    pinned_server_key: &PublicKey,
) -> Result<SharedSecret, TransportError> {
    let (read_half, mut write_half) = stream.split();
    let mut reader = BufReader::new(read_half);

    let server_hex = read_line(&mut reader).await?;
    let server_public = decode_public(&server_hex)?;
    if server_public.as_bytes() != pinned_server_key.as_bytes() {
        return Err(TransportError::Handshake(
            "server public key did not match pinned key".to_string(),
        ));
    }
    send_line(&mut write_half, &encode_public(&keypair.public)).await?;
    Ok(keypair.secret.diffie_hellman(&server_public))
}

/// Broker-side TCP router: a CURVE-style server bound to a local address.
pub struct TcpRouter {
    rx: Mutex<mpsc::Receiver<(PeerId, String)>>,
    senders: Arc<DashMap<PeerId, mpsc::Sender<String>>>,
    local_addr: std::net::SocketAddr,
    _accept_task: JoinHandle<()>,
}

impl TcpRouter {
    /// Bind `addr` and start accepting CURVE-handshaking connections.
    pub async fn bind(addr: impl AsRef<str>, keypair: Keypair) -> Result<Self, TransportError> {
        let addr = addr.as_ref().to_string();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| TransportError::Bind {
                address: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let senders: Arc<DashMap<PeerId, mpsc::Sender<String>>> = Arc::new(DashMap::new());
        let allocator = Arc::new(PeerIdAllocator::new());
        let keypair = Arc::new(keypair);

        let accept_task = tokio::spawn(accept_loop(
            listener,
            tx,
            Arc::clone(&senders),
            allocator,
            keypair,
        ));

        Ok(Self {
            rx: Mutex::new(rx),
            senders,
            local_addr,
            _accept_task: accept_task,
        })
    }

    /// The address actually bound, useful when `addr` used port `0`.
    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }

    /// Receive the next `(peer, frame)` pair.
    pub async fn recv(&self) -> Option<(PeerId, String)> {
        self.rx.lock().await.recv().await
    }

    /// Enqueue a frame for delivery to `peer`.
    pub fn send(&self, peer: PeerId, frame: String) -> Result<(), TransportError> {
        let sender = self
            .senders
            .get(&peer)
            .ok_or_else(|| TransportError::UnknownPeer(peer.to_string()))?;
        sender.try_send(frame).map_err(|_| TransportError::Closed)
    }
}

async fn accept_loop(
    listener: TcpListener,
    frames: mpsc::Sender<(PeerId, String)>,
    senders: Arc<DashMap<PeerId, mpsc::Sender<String>>>,
    allocator: Arc<PeerIdAllocator>,
    keypair: Arc<Keypair>,
) {
    loop {
        let (mut stream, _addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(error) => {
                tracing::warn!(%error, "tcp accept failed");
                continue;
            }
        };

        match server_handshake(&mut stream, &keypair).await {
            Ok((peer_public, _shared)) => {
                tracing::debug!(peer_public = %encode_public(&peer_public), "curve handshake ok");
            }
            Err(error) => {
                tracing::warn!(%error, "curve handshake failed, dropping connection");
                continue;
            }
        }

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

/// Client-side TCP dealer: a CURVE-style client dialing a pinned server.
pub struct TcpDealer {
    rx: Mutex<mpsc::Receiver<String>>,
    tx: mpsc::Sender<String>,
    _reader_task: JoinHandle<()>,
    _writer_task: JoinHandle<()>,
}

impl TcpDealer {
    /// Connect to `addr`, completing the CURVE handshake against
    /// `pinned_server_key` before any message traffic is accepted.
    pub async fn connect(
        addr: impl AsRef<str>,
        keypair: Keypair,
        pinned_server_key: PublicKey,
    ) -> Result<Self, TransportError> {
        let addr = addr.as_ref().to_string();
        let mut stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| TransportError::Connect {
                address: addr.clone(),
                source,
            })?;

        let _shared = client_handshake(&mut stream, &keypair, &pinned_server_key).await?;

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

    /// Receive the next frame from the broker.
    pub async fn recv(&self) -> Option<String> {
        self.rx.lock().await.recv().await
    }

    /// Enqueue a frame for delivery to the broker.
    pub fn send(&self, frame: String) -> Result<(), TransportError> {
        self.tx.try_send(frame).map_err(|_| TransportError::Closed)
    }
}

/// A `(public, secret)` certificate pair location on disk, named the way the
/// `certs` CLI subcommand would lay one out. Loading/saving is deliberately
/// minimal since file layout itself is out of scope (§6).
pub struct CertPaths {
    /// Path to the public key file.
    pub public: PathBuf,
    /// Path to the secret key file.
    pub secret: PathBuf,
}

impl CertPaths {
    /// Derive the conventional `{name}.public` / `{name}.secret` pair under `dir`.
    pub fn for_identity(dir: impl Into<PathBuf>, name: &str) -> Self {
        let dir = dir.into();
        Self {
            public: dir.join(format!("{name}.public")),
            secret: dir.join(format!("{name}.secret")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn public_key_hex_round_trips() {
        let keypair = Keypair::generate();
        let hex = encode_public(&keypair.public());
        let decoded = decode_public(&hex).unwrap();
        assert_eq!(decoded.as_bytes(), keypair.public().as_bytes());
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(decode_public("not-hex").is_err());
        assert!(decode_public("aa").is_err());
    }

    #[tokio::test]
    async fn router_and_dealer_complete_handshake_and_exchange_frames() {
        let server_keypair = Keypair::generate();
        let client_keypair = Keypair::generate();
        let server_public = server_keypair.public();

        let router = TcpRouter::bind("127.0.0.1:0", server_keypair).await.unwrap();
        let addr = router.local_addr().to_string();

        let dealer = TcpDealer::connect(&addr, client_keypair, server_public)
            .await
            .unwrap();

        dealer.send("PING {}".to_string()).unwrap();
        let (peer, frame) = router.recv().await.unwrap();
        assert_eq!(frame, "PING {}");

        router.send(peer, "PONG {}".to_string()).unwrap();
        let reply = dealer.recv().await.unwrap();
        assert_eq!(reply, "PONG {}");
    }

    #[tokio::test]
    async fn dealer_rejects_unpinned_server_key() {
        let server_keypair = Keypair::generate();
        let client_keypair = Keypair::generate();
        let wrong_pin = Keypair::generate().public();

        let router = TcpRouter::bind("127.0.0.1:0", server_keypair).await.unwrap();
        let addr = router.local_addr().to_string();

        let result = TcpDealer::connect(&addr, client_keypair, wrong_pin).await;
        assert!(matches!(result, Err(TransportError::Handshake(_))));
    }
}
