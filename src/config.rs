//! Configuration for the streaming client.
//!
//! [`StreamConfig`] carries the endpoint plus the connection and fan-out
//! tuning knobs. All settings have production defaults; use the `with_*`
//! builder methods to override.

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// API environment selecting the WebSocket endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Environment {
    /// Mainnet (real funds).
    #[default]
    Mainnet,
    /// Testnet (paper trading).
    Testnet,
    /// A custom endpoint, e.g. a local gateway.
    Custom(String),
}

impl Environment {
    /// WebSocket URL for this environment.
    pub fn ws_url(&self) -> &str {
        match self {
            Environment::Mainnet => "wss://mainnet.zklighter.elliot.ai/stream",
            Environment::Testnet => "wss://testnet.zklighter.elliot.ai/stream",
            Environment::Custom(url) => url,
        }
    }
}

/// Bounded queue capacities for each event family.
///
/// Queues are lossy: when a consumer falls behind and a queue fills up,
/// new events for that family are dropped rather than stalling the
/// network reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueCapacities {
    /// Order-book snapshot/delta events.
    pub order_books: usize,
    /// Public trade events.
    pub trades: usize,
    /// Market statistics events.
    pub market_stats: usize,
    /// Block height events.
    pub height: usize,
    /// Opaque account-family events.
    pub account: usize,
    /// Transaction result events.
    pub tx_results: usize,
    /// Dispatch-time errors.
    pub errors: usize,
}

impl Default for QueueCapacities {
    fn default() -> Self {
        Self {
            order_books: 100,
            trades: 100,
            market_stats: 100,
            height: 10,
            account: 100,
            tx_results: 100,
            errors: 10,
        }
    }
}

/// Configuration for [`LighterStreamClient`](crate::LighterStreamClient).
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use lighter_stream_rs::{Environment, StreamConfig};
///
/// let config = StreamConfig::new(Environment::Testnet)
///     .with_reconnect_delay(Duration::from_millis(500))
///     .with_max_reconnect_attempts(0); // retry forever
/// ```
#[derive(Debug, Clone)]
pub struct StreamConfig {
    environment: Environment,
    /// Reserved for client-initiated keepalive. The server currently
    /// authors the application-level ping and the transport handles
    /// frame-level liveness, so no keepalive task is started.
    ping_interval: Duration,
    /// Reserved alongside `ping_interval`.
    pong_timeout: Duration,
    reconnect_delay: Duration,
    max_reconnect_delay: Duration,
    max_reconnect_attempts: u32,
    queue_capacities: QueueCapacities,
}

impl StreamConfig {
    /// Create a configuration for the given environment with defaults.
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            max_reconnect_attempts: 10,
            queue_capacities: QueueCapacities::default(),
        }
    }

    /// Set the keepalive ping interval (reserved).
    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set the tolerated silence after a pong (reserved).
    #[must_use]
    pub fn with_pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = timeout;
        self
    }

    /// Set the base reconnect delay. Backoff doubles per attempt up to
    /// the maximum delay.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the reconnect backoff cap.
    #[must_use]
    pub fn with_max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay = delay;
        self
    }

    /// Set the reconnect attempt limit. `0` means retry forever.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Override the per-family event queue capacities.
    #[must_use]
    pub fn with_queue_capacities(mut self, capacities: QueueCapacities) -> Self {
        self.queue_capacities = capacities;
        self
    }

    /// The configured environment.
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// The WebSocket URL, validated.
    pub fn ws_url(&self) -> Result<Url> {
        let raw = self.environment.ws_url();
        Url::parse(raw).map_err(|e| Error::InvalidUrl(format!("{raw}: {e}")))
    }

    /// Keepalive ping interval (reserved).
    pub fn ping_interval(&self) -> Duration {
        self.ping_interval
    }

    /// Tolerated silence after a pong (reserved).
    pub fn pong_timeout(&self) -> Duration {
        self.pong_timeout
    }

    /// Base reconnect delay.
    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    /// Reconnect backoff cap.
    pub fn max_reconnect_delay(&self) -> Duration {
        self.max_reconnect_delay
    }

    /// Reconnect attempt limit (`0` = unlimited).
    pub fn max_reconnect_attempts(&self) -> u32 {
        self.max_reconnect_attempts
    }

    /// Per-family event queue capacities.
    pub fn queue_capacities(&self) -> QueueCapacities {
        self.queue_capacities
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::new(Environment::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = StreamConfig::default();
        assert_eq!(config.ping_interval(), Duration::from_secs(30));
        assert_eq!(config.pong_timeout(), Duration::from_secs(10));
        assert_eq!(config.reconnect_delay(), Duration::from_secs(1));
        assert_eq!(config.max_reconnect_delay(), Duration::from_secs(30));
        assert_eq!(config.max_reconnect_attempts(), 10);
        assert_eq!(config.queue_capacities(), QueueCapacities::default());
    }

    #[test]
    fn builder_overrides_apply() {
        let config = StreamConfig::new(Environment::Testnet)
            .with_reconnect_delay(Duration::from_millis(250))
            .with_max_reconnect_attempts(0);

        assert_eq!(config.reconnect_delay(), Duration::from_millis(250));
        assert_eq!(config.max_reconnect_attempts(), 0);
        assert!(config.environment().ws_url().contains("testnet"));
    }

    #[test]
    fn environment_urls_parse() {
        for env in [
            Environment::Mainnet,
            Environment::Testnet,
            Environment::Custom("wss://localhost:8080/stream".to_string()),
        ] {
            let config = StreamConfig::new(env);
            assert!(config.ws_url().is_ok());
        }
    }

    #[test]
    fn invalid_custom_url_is_rejected() {
        let config = StreamConfig::new(Environment::Custom("not a url".to_string()));
        assert!(matches!(config.ws_url(), Err(Error::InvalidUrl(_))));
    }
}
