//! Wire decode errors.

// Layer 2: Third-party crate imports
use thiserror::Error;

/// Failure modes for turning a raw transport frame into a [`super::Message`].
///
/// Every variant is handled the same way by callers: log and drop (§7
/// Decode error). None of these propagate to user code.
#[derive(Debug, Error)]
pub enum WireError {
    /// The frame had no content at all.
    #[error("empty frame")]
    EmptyFrame,

    /// The frame had no space-delimited `KIND` prefix.
    #[error("frame is missing a space-delimited kind prefix: {0:?}")]
    MissingKind(String),

    /// The leading token did not match any known [`super::Message`] kind.
    #[error("unknown message kind: {0}")]
    UnknownKind(String),

    /// The JSON body decoded to a variant whose `type` disagrees with the
    /// frame's leading token.
    #[error("frame kind {frame_kind} does not match decoded type {decoded_kind}")]
    KindMismatch {
        /// The kind token taken from the frame prefix.
        frame_kind: String,
        /// The kind the JSON body actually decoded to.
        decoded_kind: &'static str,
    },

    /// The JSON body could not be parsed as the declared kind.
    #[error("invalid json body: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_descriptive() {
        assert!(WireError::EmptyFrame.to_string().contains("empty"));
        assert!(WireError::UnknownKind("FROB".into())
            .to_string()
            .contains("FROB"));
    }
}
