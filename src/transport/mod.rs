//! Connection-oriented transports (§5).
//!
//! Neither the IPC nor the TCP transport speaks a multipart socket protocol;
//! each accepted connection is one addressable peer and frames are newline
//! delimited (see [`framed`]). This is the router/dealer *role* split kept
//! faithful to §4's Listen/Send single-ownership rule, not a literal socket
//! kind port.

pub mod error;
pub(crate) mod framed;
pub mod identity;
pub mod ipc;
pub mod tcp;

use async_trait::async_trait;

pub use error::TransportError;
pub use identity::PeerId;
pub use ipc::{IpcDealer, IpcRouter};
pub use tcp::{decode_public, encode_public, CertPaths, Keypair, TcpDealer, TcpRouter};

/// The broker-side half of a transport: accepts connections and moves
/// `(peer, frame)` pairs in and single frames out. Implemented by both
/// [`IpcRouter`] and [`TcpRouter`] so the broker's four loops are written
/// once against this trait (§4.1).
#[async_trait]
pub trait Router: Send + Sync + 'static {
    /// Receive the next `(peer, frame)` pair, or `None` once shut down.
    async fn recv(&self) -> Option<(PeerId, String)>;
    /// Enqueue `frame` for delivery to `peer`.
    fn send(&self, peer: PeerId, frame: String) -> Result<(), TransportError>;
}

#[async_trait]
impl Router for IpcRouter {
    async fn recv(&self) -> Option<(PeerId, String)> {
        IpcRouter::recv(self).await
    }

    fn send(&self, peer: PeerId, frame: String) -> Result<(), TransportError> {
        IpcRouter::send(self, peer, frame)
    }
}

#[async_trait]
impl Router for TcpRouter {
    async fn recv(&self) -> Option<(PeerId, String)> {
        TcpRouter::recv(self).await
    }

    fn send(&self, peer: PeerId, frame: String) -> Result<(), TransportError> {
        TcpRouter::send(self, peer, frame)
    }
}

/// The client-side half of a transport: one connection, frames in and out.
/// Implemented by both [`IpcDealer`] and [`TcpDealer`] so the client's three
/// loops are written once against this trait (§4.2).
#[async_trait]
pub trait Dealer: Send + Sync + 'static {
    /// Receive the next frame, or `None` once the connection closes.
    async fn recv(&self) -> Option<String>;
    /// Enqueue `frame` for delivery to the broker.
    fn send(&self, frame: String) -> Result<(), TransportError>;
}

#[async_trait]
impl Dealer for IpcDealer {
    async fn recv(&self) -> Option<String> {
        IpcDealer::recv(self).await
    }

    fn send(&self, frame: String) -> Result<(), TransportError> {
        IpcDealer::send(self, frame)
    }
}

#[async_trait]
impl Dealer for TcpDealer {
    async fn recv(&self) -> Option<String> {
        TcpDealer::recv(self).await
    }

    fn send(&self, frame: String) -> Result<(), TransportError> {
        TcpDealer::send(self, frame)
    }
}
