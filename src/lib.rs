//! # aductbus - Lightweight Message Bus
//!
//! A broker-and-clients message bus: clients register with a broker,
//! subscribe to topics, publish events, and exchange request/response and
//! ping/pong calls. Transport is pluggable -- a Unix-domain-socket binding
//! ships by default, with an optional TCP binding that runs a CURVE-style
//! public-key handshake before any framed traffic crosses the wire.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use aductbus::broker::Broker;
//! use aductbus::client::Client;
//! use aductbus::config::{BrokerConfig, ClientConfig};
//! use aductbus::transport::{IpcDealer, IpcRouter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let router = IpcRouter::bind("/tmp/aductbus.sock").await?;
//!     let mut broker = Broker::new(router, BrokerConfig::default());
//!     broker.start().await?;
//!
//!     let dealer = IpcDealer::connect("/tmp/aductbus.sock").await?;
//!     let mut client = Client::new("c1", dealer, ClientConfig::default());
//!     client.start().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`message`] - the closed wire message taxonomy and its textual framing
//! - [`transport`] - `Router`/`Dealer` abstractions plus IPC and TCP bindings
//! - [`broker`] - registration, subscription fan-out, request/response routing
//! - [`client`] - the client-side lifecycle and synchronous call primitive
//! - [`config`] - tunables for broker and client construction
//! - [`history`] - optional, observational record of messages sent/received
//! - [`util`] - identifiers and serde helpers shared across the crate

pub mod broker;
pub mod client;
pub mod config;
pub mod history;
pub mod message;
pub mod transport;
pub mod util;

pub use broker::{Broker, BrokerError};
pub use client::{Client, ClientError};
pub use config::{BrokerConfig, ClientConfig};
pub use history::{Direction, HistoryEntry, HistoryStore, InMemoryHistoryStore};
pub use message::{Common, Message, WireError, DEFAULT_TIMEOUT};
pub use transport::{CertPaths, Dealer, Keypair, PeerId, Router, TransportError};
pub use util::MessageId;
