//! Messaging and broker connection configuration types.

use std::time::Duration;

use serde::Deserialize;

use crate::utils::retry::{RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};

/// Default exchange shared by all account services.
pub const DEFAULT_EXCHANGE: &str = "email-pub-sub";

/// Messaging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// AMQP-specific configuration.
    pub amqp: AmqpConfig,
    /// Connect retry configuration.
    pub connect: ConnectConfig,
}

/// AMQP-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AmqpConfig {
    /// AMQP connection URL.
    pub url: String,
    /// Topic exchange name.
    pub exchange: String,
    /// Heartbeat interval negotiated with the broker, appended to the URL.
    pub heartbeat_secs: u16,
}

impl Default for AmqpConfig {
    fn default() -> Self {
        Self {
            url: "amqp://localhost".to_string(),
            exchange: DEFAULT_EXCHANGE.to_string(),
            heartbeat_secs: 60,
        }
    }
}

impl AmqpConfig {
    /// Connection URL with the heartbeat query parameter added.
    pub fn connection_url(&self) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}heartbeat={}", self.url, separator, self.heartbeat_secs)
    }
}

/// Connect retry configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    /// Retries after the initial attempt while the broker refuses connections.
    pub max_retries: u32,
    /// Fixed sleep between attempts, in milliseconds.
    pub retry_sleep_ms: u64,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_sleep_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
        }
    }
}

impl ConnectConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_sleep_ms))
    }
}
