//! Client error types (§7 Timeout / Transport error / Lifecycle error).

use thiserror::Error;

use crate::transport::TransportError;

/// Failures a synchronous client call can surface to its caller.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A synchronous call did not observe its response within its timeout.
    #[error("timed out waiting for a response from {target}")]
    Timeout {
        /// The peer or broker the call was addressed to.
        target: String,
    },

    /// The client's transport is unusable.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// `start()` was called twice, or a call was made before `start()`.
    #[error("client lifecycle error: {0}")]
    Lifecycle(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn timeout_error_names_the_target() {
        let error = ClientError::Timeout {
            target: "c2".to_string(),
        };
        assert!(error.to_string().contains("c2"));
    }

    #[test]
    fn lifecycle_error_is_descriptive() {
        let error = ClientError::Lifecycle("already started".to_string());
        assert!(error.to_string().contains("already started"));
    }
}
