//! Wire message taxonomy and framing (§3, §6).
//!
//! [`Message`] is the closed sum type for every kind of traffic on the bus.
//! [`wire::encode`] / [`wire::decode`] implement the `"{KIND} {json}"`
//! textual framing used by both the broker and the client.

pub mod error;
pub mod model;
pub mod wire;

pub use error::WireError;
pub use model::{Common, Message, DEFAULT_TIMEOUT};
