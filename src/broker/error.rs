//! Broker error types (§7 Transport error / Lifecycle error).

use thiserror::Error;

use crate::transport::TransportError;

/// Failures that can occur starting or stopping a broker.
///
/// Per-message failures (decode errors, unknown targets, empty topics) are
/// not represented here: the failure-mode rules require those to be logged
/// and dropped inside the affected loop, never propagated to the caller.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker's transport could not be bound.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// `stop()` was called before `start()`, or `start()` was called twice.
    #[error("broker lifecycle error: {0}")]
    Lifecycle(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_error_message_is_descriptive() {
        let error = BrokerError::Lifecycle("already started".to_string());
        assert!(error.to_string().contains("already started"));
    }

    #[test]
    fn transport_error_wraps_through() {
        let error: BrokerError = TransportError::Closed.into();
        assert!(matches!(
            error,
            BrokerError::Transport(TransportError::Closed)
        ));
    }
}
