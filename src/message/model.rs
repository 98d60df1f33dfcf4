//! The closed set of message kinds exchanged between clients and the broker.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::util::serde_helpers::duration_secs;
use crate::util::MessageId;

/// Default timeout applied to `REQUEST`, `COMMAND` and `PING` messages when
/// none is supplied (§3 JSON field conventions).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

/// Fields shared by every message kind: `id`, `timestamp`, `source`, `body`.
///
/// Embedded via `#[serde(flatten)]` in each [`Message`] variant so the wire
/// JSON carries these fields alongside the kind-specific ones instead of
/// nesting them under a `common` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Common {
    /// Time-ordered unique id of this message.
    pub id: MessageId,
    /// UTC wall-clock time at construction.
    pub timestamp: DateTime<Utc>,
    /// Name of the emitting client (or `"broker"`).
    pub source: String,
    /// Opaque payload. Empty or a kind-specific default marker when unused.
    #[serde(default)]
    pub body: String,
}

impl Common {
    fn new(source: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            timestamp: Utc::now(),
            source: source.into(),
            body: body.into(),
        }
    }
}

/// The closed taxonomy of wire messages (§3).
///
/// Modeled as a tagged union rather than an inheritance hierarchy: the
/// variant name *is* the wire `KIND` token, and `#[serde(tag = "type")]`
/// makes the same token double as the JSON `type` field the spec requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// Client → Broker: announce presence under `source`.
    #[serde(rename = "REGISTER")]
    Register {
        #[serde(flatten)]
        common: Common,
    },
    /// Client → Broker: add `source` to `topic`'s subscriber list.
    #[serde(rename = "SUBSCRIBE")]
    Subscribe {
        #[serde(flatten)]
        common: Common,
        topic: String,
    },
    /// Broadcast payload on `topic` (the broker fans out to subscribers).
    #[serde(rename = "EVENT")]
    Event {
        #[serde(flatten)]
        common: Common,
        topic: String,
    },
    /// Addressed call from `source` to `target`.
    #[serde(rename = "REQUEST")]
    Request {
        #[serde(flatten)]
        common: Common,
        target: String,
        #[serde(with = "duration_secs", default = "default_timeout")]
        timeout: Duration,
    },
    /// Reply correlated by `request_id` back to `requestor`.
    #[serde(rename = "RESPONSE")]
    Response {
        #[serde(flatten)]
        common: Common,
        request_id: MessageId,
        requestor: String,
    },
    /// Request addressed to the broker itself; `body` names the command.
    #[serde(rename = "COMMAND")]
    Command {
        #[serde(flatten)]
        common: Common,
        target: String,
        #[serde(with = "duration_secs", default = "default_timeout")]
        timeout: Duration,
    },
    /// Specialization of `REQUEST`; `body` is always `"PING"`.
    #[serde(rename = "PING")]
    Ping {
        #[serde(flatten)]
        common: Common,
        target: String,
        #[serde(with = "duration_secs", default = "default_timeout")]
        timeout: Duration,
    },
    /// Specialization of `RESPONSE`; `body` is always `"PONG"`.
    #[serde(rename = "PONG")]
    Pong {
        #[serde(flatten)]
        common: Common,
        request_id: MessageId,
        requestor: String,
    },
    /// Broker acknowledgement of a `REGISTER` or `SUBSCRIBE`.
    #[serde(rename = "ACK")]
    Ack {
        #[serde(flatten)]
        common: Common,
        request_id: MessageId,
        requestor: String,
    },
}

impl Message {
    /// Build a `REGISTER` message.
    pub fn register(source: impl Into<String>) -> Self {
        Self::Register {
            common: Common::new(source, ""),
        }
    }

    /// Build a `SUBSCRIBE` message.
    pub fn subscribe(source: impl Into<String>, topic: impl Into<String>) -> Self {
        Self::Subscribe {
            common: Common::new(source, ""),
            topic: topic.into(),
        }
    }

    /// Build an `EVENT` message.
    pub fn event(
        source: impl Into<String>,
        topic: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self::Event {
            common: Common::new(source, body),
            topic: topic.into(),
        }
    }

    /// Build a `REQUEST` message addressed to `target`.
    pub fn request(
        source: impl Into<String>,
        target: impl Into<String>,
        body: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self::Request {
            common: Common::new(source, body),
            target: target.into(),
            timeout,
        }
    }

    /// Build a `RESPONSE` correlated to `request_id`, addressed back to `requestor`.
    pub fn response(
        source: impl Into<String>,
        requestor: impl Into<String>,
        request_id: MessageId,
        body: impl Into<String>,
    ) -> Self {
        Self::Response {
            common: Common::new(source, body),
            request_id,
            requestor: requestor.into(),
        }
    }

    /// Build a `COMMAND` addressed to `target` (typically `"broker"`).
    pub fn command(
        source: impl Into<String>,
        target: impl Into<String>,
        body: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self::Command {
            common: Common::new(source, body),
            target: target.into(),
            timeout,
        }
    }

    /// Build a `PING` addressed to `target`.
    pub fn ping(source: impl Into<String>, target: impl Into<String>, timeout: Duration) -> Self {
        Self::Ping {
            common: Common::new(source, "PING"),
            target: target.into(),
            timeout,
        }
    }

    /// Build a `PONG` replying to `ping_id`, addressed back to `requestor`.
    pub fn pong(
        source: impl Into<String>,
        requestor: impl Into<String>,
        ping_id: MessageId,
    ) -> Self {
        Self::Pong {
            common: Common::new(source, "PONG"),
            request_id: ping_id,
            requestor: requestor.into(),
        }
    }

    /// Build an `ACK` acknowledging `request_id`, addressed back to `requestor`.
    pub fn ack(
        source: impl Into<String>,
        requestor: impl Into<String>,
        request_id: MessageId,
    ) -> Self {
        Self::Ack {
            common: Common::new(source, ""),
            request_id,
            requestor: requestor.into(),
        }
    }

    /// The shared fields common to every variant.
    pub fn common(&self) -> &Common {
        match self {
            Self::Register { common }
            | Self::Subscribe { common, .. }
            | Self::Event { common, .. }
            | Self::Request { common, .. }
            | Self::Response { common, .. }
            | Self::Command { common, .. }
            | Self::Ping { common, .. }
            | Self::Pong { common, .. }
            | Self::Ack { common, .. } => common,
        }
    }

    /// This message's unique id.
    pub fn id(&self) -> MessageId {
        self.common().id
    }

    /// The name of the client (or `"broker"`) that emitted this message.
    pub fn source(&self) -> &str {
        &self.common().source
    }

    /// The opaque payload.
    pub fn body(&self) -> &str {
        &self.common().body
    }

    /// The uppercase wire token for this variant, e.g. `"REQUEST"`.
    pub fn kind_token(&self) -> &'static str {
        match self {
            Self::Register { .. } => "REGISTER",
            Self::Subscribe { .. } => "SUBSCRIBE",
            Self::Event { .. } => "EVENT",
            Self::Request { .. } => "REQUEST",
            Self::Response { .. } => "RESPONSE",
            Self::Command { .. } => "COMMAND",
            Self::Ping { .. } => "PING",
            Self::Pong { .. } => "PONG",
            Self::Ack { .. } => "ACK",
        }
    }

    /// The topic this message concerns, for `SUBSCRIBE` and `EVENT`.
    pub fn topic(&self) -> Option<&str> {
        match self {
            Self::Subscribe { topic, .. } | Self::Event { topic, .. } => Some(topic),
            _ => None,
        }
    }

    /// The addressed target, for `REQUEST`, `COMMAND` and `PING`.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Request { target, .. } | Self::Command { target, .. } | Self::Ping { target, .. } => {
                Some(target)
            }
            _ => None,
        }
    }

    /// The caller-supplied timeout, for `REQUEST`, `COMMAND` and `PING`.
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Self::Request { timeout, .. }
            | Self::Command { timeout, .. }
            | Self::Ping { timeout, .. } => Some(*timeout),
            _ => None,
        }
    }

    /// The id of the request this message correlates to, for `RESPONSE`,
    /// `PONG` and `ACK`.
    pub fn request_id(&self) -> Option<MessageId> {
        match self {
            Self::Response { request_id, .. }
            | Self::Pong { request_id, .. }
            | Self::Ack { request_id, .. } => Some(*request_id),
            _ => None,
        }
    }

    /// The name the reply should be routed back to, for `RESPONSE`, `PONG`
    /// and `ACK`.
    pub fn requestor(&self) -> Option<&str> {
        match self {
            Self::Response { requestor, .. }
            | Self::Pong { requestor, .. }
            | Self::Ack { requestor, .. } => Some(requestor),
            _ => None,
        }
    }

    /// `true` for the kinds the broker is responsible for watchdogging
    /// (§4.1 `pending` table): `REQUEST` and `PING`.
    pub fn is_pending_request(&self) -> bool {
        matches!(self, Self::Request { .. } | Self::Ping { .. })
    }

    /// `true` for the kinds that resolve a pending request: `RESPONSE`,
    /// `PONG`, `ACK`.
    pub fn is_reply(&self) -> bool {
        matches!(self, Self::Response { .. } | Self::Pong { .. } | Self::Ack { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn register_has_empty_body_and_no_target() {
        let msg = Message::register("c1");
        assert_eq!(msg.kind_token(), "REGISTER");
        assert_eq!(msg.source(), "c1");
        assert_eq!(msg.body(), "");
        assert!(msg.target().is_none());
    }

    #[test]
    fn ping_defaults_body_to_marker() {
        let msg = Message::ping("c1", "c2", DEFAULT_TIMEOUT);
        assert_eq!(msg.body(), "PING");
        assert_eq!(msg.target(), Some("c2"));
        assert_eq!(msg.timeout(), Some(DEFAULT_TIMEOUT));
        assert!(msg.is_pending_request());
    }

    #[test]
    fn pong_correlates_to_ping_id() {
        let ping = Message::ping("c1", "c2", DEFAULT_TIMEOUT);
        let pong = Message::pong("c2", "c1", ping.id());
        assert_eq!(pong.request_id(), Some(ping.id()));
        assert_eq!(pong.requestor(), Some("c1"));
        assert!(pong.is_reply());
    }

    #[test]
    fn event_carries_topic_and_body() {
        let msg = Message::event("c2", "t", "hello world");
        assert_eq!(msg.topic(), Some("t"));
        assert_eq!(msg.body(), "hello world");
    }

    #[test]
    fn each_message_gets_a_distinct_id() {
        let a = Message::register("c1");
        let b = Message::register("c1");
        assert_ne!(a.id(), b.id());
    }
}
