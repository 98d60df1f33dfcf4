//! Transport-level errors (§7 Transport error).

use thiserror::Error;

/// Failures that can occur while binding, connecting, or moving frames over
/// a transport. Unlike [`crate::message::WireError`], these are fatal to the
/// affected node: `start()` fails, or a running loop logs and stops.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Binding the listening side failed (address in use, permission denied).
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// The address that could not be bound.
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Connecting the dialing side failed.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        /// The address that could not be reached.
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The CURVE-style handshake did not complete (bad key, peer hung up
    /// mid-handshake, or the server's public key didn't match the pinned one).
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The destination peer is not known to this router.
    #[error("unknown peer: {0}")]
    UnknownPeer(String),

    /// The peer's connection is gone (reader or writer task exited).
    #[error("connection closed")]
    Closed,

    /// A lower-level I/O error occurred while framing or transmitting.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
