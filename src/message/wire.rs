//! Textual framing: `"{KIND} {json}"` (§6 Wire framing).

use super::error::WireError;
use super::model::Message;

const KNOWN_KINDS: &[&str] = &[
    "REGISTER",
    "SUBSCRIBE",
    "EVENT",
    "REQUEST",
    "RESPONSE",
    "COMMAND",
    "PING",
    "PONG",
    "ACK",
];

/// Frame a message for the wire: the uppercase kind token, a space, and the
/// compact JSON serialization of the message.
pub fn encode(message: &Message) -> Result<String, WireError> {
    let json = serde_json::to_string(message)?;
    Ok(format!("{} {json}", message.kind_token()))
}

/// Parse a raw frame back into a [`Message`].
///
/// The leading token is used to select which kind is expected *before* the
/// JSON body is parsed (the design note's "tagged union, not inheritance"
/// guidance); the JSON body's own `type` field is then checked against it so
/// a corrupted or forged frame is rejected rather than silently routed under
/// the wrong kind.
pub fn decode(frame: &str) -> Result<Message, WireError> {
    if frame.is_empty() {
        return Err(WireError::EmptyFrame);
    }
    let (kind, json) = frame
        .split_once(' ')
        .ok_or_else(|| WireError::MissingKind(frame.to_string()))?;
    if !KNOWN_KINDS.contains(&kind) {
        return Err(WireError::UnknownKind(kind.to_string()));
    }
    let message: Message = serde_json::from_str(json)?;
    if message.kind_token() != kind {
        return Err(WireError::KindMismatch {
            frame_kind: kind.to_string(),
            decoded_kind: message.kind_token(),
        });
    }
    Ok(message)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::model::DEFAULT_TIMEOUT;

    #[test]
    fn round_trips_every_kind() {
        let ping = Message::ping("c1", "c2", DEFAULT_TIMEOUT);
        let messages = vec![
            Message::register("c1"),
            Message::subscribe("c1", "t"),
            Message::event("c1", "t", "hello"),
            Message::request("c1", "c2", "hi", DEFAULT_TIMEOUT),
            Message::response("c2", "c1", ping.id(), "ok"),
            Message::command("c1", "broker", "GET_CLIENTS", DEFAULT_TIMEOUT),
            ping.clone(),
            Message::pong("c2", "c1", ping.id()),
            Message::ack("broker", "c1", ping.id()),
        ];
        for message in messages {
            let frame = encode(&message).unwrap();
            let decoded = decode(&frame).unwrap();
            assert_eq!(decoded, message);
        }
    }

    #[test]
    fn frame_starts_with_kind_token() {
        let frame = encode(&Message::register("c1")).unwrap();
        assert!(frame.starts_with("REGISTER {"));
    }

    #[test]
    fn rejects_empty_frame() {
        assert!(matches!(decode(""), Err(WireError::EmptyFrame)));
    }

    #[test]
    fn rejects_frame_without_space() {
        assert!(matches!(decode("REGISTER"), Err(WireError::MissingKind(_))));
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(matches!(
            decode("FROB {}"),
            Err(WireError::UnknownKind(k)) if k == "FROB"
        ));
    }

    #[test]
    fn rejects_kind_json_mismatch() {
        let subscribe_json = serde_json::to_string(&Message::subscribe("c1", "t")).unwrap();
        let forged = format!("REGISTER {subscribe_json}");
        assert!(matches!(decode(&forged), Err(WireError::KindMismatch { .. })));
    }

    #[test]
    fn timeout_defaults_to_five_seconds_when_missing() {
        let json = r#"{"type":"REQUEST","id":"018f0000-0000-7000-8000-000000000000","timestamp":"2026-01-01T00:00:00Z","source":"c1","target":"c2"}"#;
        let frame = format!("REQUEST {json}");
        let decoded = decode(&frame).unwrap();
        assert_eq!(decoded.timeout(), Some(DEFAULT_TIMEOUT));
    }
}
