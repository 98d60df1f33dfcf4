//! Broker and client configuration with sensible defaults.

// Layer 1: Standard library
use std::time::Duration;

// Layer 2: Third-party
use serde::{Deserialize, Serialize};

/// Default bound on the internal rx/tx channels each node runs.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default interval between pending-request watchdog sweeps (§4.1 Watch).
pub const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_millis(100);

/// Default timeout a client waits for its `REGISTER`'s `ACK` in `start()`.
pub const DEFAULT_REGISTER_TIMEOUT: Duration = Duration::from_secs(5);

/// Broker-side configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Capacity of the broker's internal rx/tx queues.
    pub channel_capacity: usize,
    /// How often the watchdog loop sweeps `pending` for timeouts.
    pub watchdog_interval: Duration,
    /// Optional uniform-random delay range applied in the send loop, to
    /// simulate network latency in tests and demos (§4.1 Send, §9).
    pub latency_range: Option<(Duration, Duration)>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            watchdog_interval: DEFAULT_WATCHDOG_INTERVAL,
            latency_range: None,
        }
    }
}

impl BrokerConfig {
    /// Start building a configuration from defaults.
    pub fn builder() -> BrokerConfigBuilder {
        BrokerConfigBuilder::default()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.channel_capacity == 0 {
            return Err("channel_capacity must be > 0".to_string());
        }
        if self.watchdog_interval.is_zero() {
            return Err("watchdog_interval must be > 0".to_string());
        }
        if let Some((lower, upper)) = self.latency_range {
            if lower > upper {
                return Err("latency_range lower bound must not exceed upper bound".to_string());
            }
        }
        Ok(())
    }
}

/// Fluent builder for [`BrokerConfig`].
#[derive(Debug, Default)]
pub struct BrokerConfigBuilder {
    config: BrokerConfig,
}

impl BrokerConfigBuilder {
    /// Set the internal queue capacity.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Set the watchdog sweep interval.
    pub fn with_watchdog_interval(mut self, interval: Duration) -> Self {
        self.config.watchdog_interval = interval;
        self
    }

    /// Enable simulated send-path latency uniformly sampled from `[lower, upper]`.
    pub fn with_latency_range(mut self, lower: Duration, upper: Duration) -> Self {
        self.config.latency_range = Some((lower, upper));
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<BrokerConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Client-side configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Capacity of the client's internal rx/tx queues.
    pub channel_capacity: usize,
    /// How long `start()` waits for the initial `REGISTER`'s `ACK`.
    pub register_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            register_timeout: DEFAULT_REGISTER_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Start building a configuration from defaults.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.channel_capacity == 0 {
            return Err("channel_capacity must be > 0".to_string());
        }
        if self.register_timeout.is_zero() {
            return Err("register_timeout must be > 0".to_string());
        }
        Ok(())
    }
}

/// Fluent builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the internal queue capacity.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Set the register timeout.
    pub fn with_register_timeout(mut self, timeout: Duration) -> Self {
        self.config.register_timeout = timeout;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<ClientConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn broker_defaults_are_sane() {
        let config = BrokerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert!(config.latency_range.is_none());
    }

    #[test]
    fn broker_builder_rejects_zero_capacity() {
        let result = BrokerConfig::builder().with_channel_capacity(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn broker_builder_rejects_inverted_latency_range() {
        let result = BrokerConfig::builder()
            .with_latency_range(Duration::from_millis(50), Duration::from_millis(10))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn broker_builder_accepts_latency_range() {
        let config = BrokerConfig::builder()
            .with_latency_range(Duration::from_millis(1), Duration::from_millis(5))
            .build()
            .unwrap();
        assert_eq!(
            config.latency_range,
            Some((Duration::from_millis(1), Duration::from_millis(5)))
        );
    }

    #[test]
    fn client_defaults_are_sane() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.register_timeout, DEFAULT_REGISTER_TIMEOUT);
    }

    #[test]
    fn client_builder_rejects_zero_register_timeout() {
        let result = ClientConfig::builder()
            .with_register_timeout(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }
}
